//! Cellular uplink send sequences.
//!
//! Each sequence is a fixed list of AT transactions. A step passes when its
//! response contains the expected token; anything else aborts the send with the
//! step that failed.

use std::time::Duration;

use log::{debug, info, warn};

use crate::clock::Clock;
use crate::error::RelayError;
use crate::events::Channel;
use crate::modem::at::{has_terminator, AtPort, ModemTransport};

/// End-of-message byte for SMS text mode.
pub const CTRL_Z: u8 = 0x1A;

const SMS_TEXT_MODE_TIMEOUT: Duration = Duration::from_secs(2);
const SMS_RECIPIENT_TIMEOUT: Duration = Duration::from_secs(5);
const SMS_SUBMIT_TIMEOUT: Duration = Duration::from_secs(10);
const CONNECT_TIMEOUT: Duration = Duration::from_secs(15);
const PUBLISH_TIMEOUT: Duration = Duration::from_secs(10);
const DISCONNECT_TIMEOUT: Duration = Duration::from_secs(5);

/// Broker endpoint and session parameters for the publish channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BrokerConfig {
    pub host: String,
    pub port: u16,
    pub client_id: String,
    pub topic: String,
    pub keepalive_secs: u32,
}

/// Check one step's response.
///
/// A response with no terminator at all means the peripheral ran out of time;
/// a terminated response without `expected` means it refused.
fn check_step(
    response: &str,
    expected: &'static str,
    channel: Channel,
    step: &'static str,
    command: &str,
) -> Result<(), RelayError> {
    if response.contains(expected) {
        return Ok(());
    }
    if !has_terminator(response) {
        return Err(RelayError::TransactionTimeout {
            command: command.to_string(),
        });
    }
    Err(RelayError::SendAborted {
        channel,
        step,
        expected,
    })
}

/// Text-mode SMS: select text mode, address the recipient, send the body, wait
/// for the `+CMGS:` acknowledgement.
pub async fn send_sms<T: ModemTransport, C: Clock>(
    port: &mut AtPort<T, C>,
    recipient: &str,
    message: &str,
) -> Result<(), RelayError> {
    let text_mode = "AT+CMGF=1";
    let resp = port.send_and_wait(text_mode, SMS_TEXT_MODE_TIMEOUT).await;
    check_step(&resp, "OK", Channel::Sms, "text-mode", text_mode)?;

    let address = format!("AT+CMGS=\"{}\"", recipient);
    let resp = port.send_and_wait(&address, SMS_RECIPIENT_TIMEOUT).await;
    check_step(&resp, ">", Channel::Sms, "recipient", &address)?;

    let mut body = Vec::with_capacity(message.len() + 1);
    body.extend_from_slice(message.as_bytes());
    body.push(CTRL_Z);
    if let Err(e) = port.write_raw(&body) {
        // the acknowledgement wait below reports the outcome
        warn!("SMS body write failed: {}", e);
    }

    let resp = port.send_and_wait("", SMS_SUBMIT_TIMEOUT).await;
    check_step(&resp, "+CMGS:", Channel::Sms, "submit", "<sms body>")?;
    info!("SMS sent to {}", recipient);
    Ok(())
}

/// Make `message` safe to embed in a quoted AT argument: double quotes become
/// single quotes and control characters become spaces.
pub fn quoted_payload(message: &str) -> String {
    message
        .chars()
        .map(|c| match c {
            '"' => '\'',
            c if c.is_control() => ' ',
            c => c,
        })
        .collect()
}

/// Connect to the broker, publish `message` on the configured topic, then
/// disconnect. The disconnect is issued whenever the connect succeeded; its
/// own response is not checked.
pub async fn publish<T: ModemTransport, C: Clock>(
    port: &mut AtPort<T, C>,
    broker: &BrokerConfig,
    message: &str,
) -> Result<(), RelayError> {
    let connect = format!(
        "AT+MQTTCONN=\"{}\",{},\"{}\",{},0",
        broker.host, broker.port, broker.client_id, broker.keepalive_secs
    );
    let resp = port.send_and_wait(&connect, CONNECT_TIMEOUT).await;
    check_step(&resp, "OK", Channel::Publish, "connect", &connect)?;

    let publish = format!(
        "AT+MQTTPUB=\"{}\",\"{}\",0,0,0",
        broker.topic,
        quoted_payload(message)
    );
    let resp = port.send_and_wait(&publish, PUBLISH_TIMEOUT).await;
    let outcome = check_step(&resp, "OK", Channel::Publish, "publish", &publish);

    let resp = port.send_and_wait("AT+MQTTDISCONN", DISCONNECT_TIMEOUT).await;
    if !resp.contains("OK") {
        debug!("broker disconnect not acknowledged");
    }

    if outcome.is_ok() {
        info!("Published to {} on {}:{}", broker.topic, broker.host, broker.port);
    }
    outcome
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn step_outcomes() {
        assert!(check_step("\r\nOK\r\n", "OK", Channel::Sms, "text-mode", "AT+CMGF=1").is_ok());
        assert_eq!(
            check_step("", "OK", Channel::Sms, "text-mode", "AT+CMGF=1"),
            Err(RelayError::TransactionTimeout {
                command: "AT+CMGF=1".into()
            })
        );
        assert_eq!(
            check_step("\r\nERROR\r\n", ">", Channel::Sms, "recipient", "AT+CMGS=\"1\""),
            Err(RelayError::SendAborted {
                channel: Channel::Sms,
                step: "recipient",
                expected: ">"
            })
        );
    }

    #[test]
    fn payload_cannot_close_the_quoted_argument() {
        assert_eq!(
            quoted_payload("T:1.00,L:31\"N,\r\n12E"),
            "T:1.00,L:31'N,  12E"
        );
        assert_eq!(quoted_payload("T:1.00,L:No Fix0"), "T:1.00,L:No Fix0");
    }

    #[tokio::test]
    async fn publish_command_carries_sanitized_payload() {
        use crate::clock::ManualClock;
        use bytes::Bytes;
        use std::io;

        #[derive(Default)]
        struct Accepting(Vec<u8>);
        impl ModemTransport for Accepting {
            fn write(&mut self, bytes: &[u8]) -> io::Result<()> {
                self.0.extend_from_slice(bytes);
                Ok(())
            }
            fn read_available(&mut self) -> io::Result<Bytes> {
                Ok(Bytes::from_static(b"\r\nOK\r\n"))
            }
        }

        let broker = BrokerConfig {
            host: "broker".into(),
            port: 1883,
            client_id: "gw".into(),
            topic: "t".into(),
            keepalive_secs: 60,
        };
        let mut port = AtPort::new(Accepting::default(), ManualClock::new());
        publish(&mut port, &broker, "L:a\"b").await.unwrap();

        let written = String::from_utf8(port.transport().0.clone()).unwrap();
        assert!(written.contains("AT+MQTTPUB=\"t\",\"L:a'b\",0,0,0\r\n"));
    }

    #[test]
    fn ack_token_required_even_when_terminated() {
        let err = check_step("\r\nOK\r\n", "+CMGS:", Channel::Sms, "submit", "<sms body>");
        assert!(matches!(err, Err(RelayError::SendAborted { step: "submit", .. })));
    }
}
