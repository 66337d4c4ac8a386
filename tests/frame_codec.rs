use fieldrelay::codec::{
    decode_lenient, decode_strict, outgoing_message, DecodeStrategy, LocationFix, SensorReading,
    SENTINEL,
};
use fieldrelay::error::RelayError;

fn close(a: f32, b: f32) -> bool {
    (a - b).abs() < 0.006
}

#[test]
fn decodes_reference_frame() {
    let r = decode_lenient("T:21.50,H:55.30,P:1013.25").unwrap();
    assert_eq!(r, SensorReading::new(21.50, 55.30, 1013.25));

    let r = decode_strict("T:21.50,H:55.30,P:1013.25").unwrap();
    assert!(close(r.temperature, 21.50));
    assert!(close(r.humidity, 55.30));
    assert!(close(r.pressure, 1013.25));
}

#[test]
fn garbage_is_a_failure() {
    for strategy in [DecodeStrategy::Lenient, DecodeStrategy::Strict] {
        assert!(matches!(
            strategy.decode("garbage"),
            Err(RelayError::DecodeFailure(_))
        ));
    }
}

#[test]
fn empty_fields_are_a_failure() {
    assert!(decode_lenient("T:,H:,P:").is_err());
    assert!(decode_strict("T:,H:,P:").is_err());
}

#[test]
fn encode_then_decode_keeps_two_decimals() {
    let readings = [
        SensorReading::new(23.456, 61.004, 1002.5),
        SensorReading::new(-4.25, 99.99, 990.0),
        SensorReading::new(0.0, SENTINEL, 1013.25),
    ];
    for original in readings {
        let decoded = decode_lenient(&original.encode()).unwrap();
        for (got, want) in decoded.fields().iter().zip(original.fields()) {
            if want == SENTINEL {
                assert_eq!(*got, SENTINEL);
            } else {
                assert!(close(*got, want), "{got} vs {want}");
            }
        }
    }
}

#[test]
fn lenient_tolerates_reordering_and_noise() {
    let r = decode_lenient("P:1001.10,\r\nT:19.20\0,H:40.00xyz").unwrap();
    assert!(close(r.temperature, 19.20));
    assert!(close(r.humidity, 40.00));
    assert!(close(r.pressure, 1001.10));
}

#[test]
fn lenient_fills_missing_field_with_sentinel() {
    let r = decode_lenient("T:19.20,H:abc,P:1001.10").unwrap();
    assert_eq!(r.humidity, SENTINEL);
    assert!(r.is_present());
}

#[test]
fn lenient_requires_every_label() {
    assert!(decode_lenient("T:19.20,H:40.00").is_err());
}

#[test]
fn strict_is_all_or_nothing() {
    assert!(decode_strict("T:19.20,H:abc,P:1001.10").is_err());
    assert!(decode_strict("H:40.00,T:19.20,P:1001.10").is_err());
}

#[test]
fn non_finite_fields_encode_as_sentinel() {
    let frame = SensorReading::new(f32::NAN, f32::INFINITY, 1000.0).encode();
    assert_eq!(frame, "T:9999.00,H:9999.00,P:1000.00");
}

#[test]
fn outgoing_message_is_bit_exact() {
    let reading = SensorReading::new(21.5, 55.3, 1013.25);
    let fix = LocationFix::from_response("\r\n+CGPSINFO: 3113.34,N,12121.23,E\r\n\r\nOK\r\n");
    assert_eq!(
        outgoing_message(&reading, &fix),
        "T:21.50,H:55.30,P:1013.25,L:3113.34,N,12121.23,E"
    );
    assert_eq!(
        outgoing_message(&SensorReading::UNKNOWN, &LocationFix::no_fix()),
        "T:9999.00,H:9999.00,P:9999.00,L:No Fix0"
    );
}

#[test]
fn empty_fix_fields_mean_no_fix() {
    let fix = LocationFix::from_response("\r\n+CGPSINFO: ,,,,,,,,\r\nOK");
    assert!(!fix.has_fix());
    assert_eq!(fix.as_str(), "L:No Fix0");
    assert!(!LocationFix::from_response("ERROR").has_fix());
}
