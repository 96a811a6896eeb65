dtls_struct!(Alert => {
    AlertLevel level;
    AlertDescription description;
});

impl Alert {
    pub fn fatal(description: AlertDescription) -> Self {
        Self {
            level: AlertLevel::fatal,
            description,
        }
    }

    pub fn close_notify() -> Self {
        // close_notify is a warning level alert in both directions.
        Self {
            level: AlertLevel::warning,
            description: AlertDescription::close_notify,
        }
    }
}

dtls_enum_u8!(AlertLevel => {
    warning(1), fatal(2), (255)
});

dtls_enum_u8!(AlertDescription => {
    close_notify(0),
    unexpected_message(10),
    bad_record_mac(20),
    record_overflow(22),
    handshake_failure(40),
    bad_certificate(42),
    unsupported_certificate(43),
    certificate_unknown(46),
    illegal_parameter(47),
    unknown_ca(48),
    decode_error(50),
    decrypt_error(51),
    protocol_version(70),
    internal_error(80),
    user_canceled(90),
    unsupported_extension(110),
    unknown_psk_identity(115),
    (255)
});

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parsing::Cursor;
    use bytes::Bytes;

    #[test]
    fn alert_round_trip() {
        let alert = Alert::fatal(AlertDescription::handshake_failure);

        let mut out = vec![];
        alert.serialize(&mut out);
        assert_eq!(&out, &[2, 40]);

        let mut c = Cursor::new(Bytes::from(out));
        assert_eq!(Alert::parse(&mut c).unwrap(), alert);
    }

    #[test]
    fn unknown_description_preserved() {
        let mut c = Cursor::new(Bytes::from_static(&[1, 200]));
        let alert = Alert::parse(&mut c).unwrap();
        assert_eq!(alert.description, AlertDescription::unknown(200));

        let mut out = vec![];
        alert.serialize(&mut out);
        assert_eq!(&out, &[1, 200]);
    }
}
