use std::collections::BTreeMap;
use std::sync::Arc;

use bytes::Bytes;
use log::{debug, warn};
use p256::ecdsa::VerifyingKey;

use crate::alert::{Alert, AlertDescription, AlertLevel};
use crate::cipher::RecordProtection;
use crate::cipher_suite::{CipherSuite, CipherSuiteParams, KeyExchangeAlgorithm};
use crate::cookie::CookieGenerator;
use crate::crypto::{psk_premaster_secret, secure_random_bytes, sign_sha256_ecdsa, verify_sha256_ecdsa, EcdheContext};
use crate::error::{Error, Result};
use crate::extensions::*;
use crate::flight::Flight;
use crate::handshake::*;
use crate::key_schedule::KeySchedule;
use crate::options::ServerOptions;
use crate::parsing::{serialize_u24, Cursor};
use crate::reassembly::{ReassembledMessage, Reassembler};
use crate::record::{ContentType, Record};
use crate::session::Session;
use crate::transcript::Transcript;

/// Out of order messages kept while waiting for their predecessors. A full
/// client flight is at most five messages, so anything beyond this is noise.
const MAX_QUEUED_MESSAGES: usize = 8;

/// Certificate types this server can produce for itself and consume from
/// clients, in no particular order; the client's preference decides.
const SUPPORTED_CERTIFICATE_TYPES: &[CertificateType] =
    &[CertificateType::X509, CertificateType::RawPublicKey];

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum ServerState {
    ExpectClientHelloNoCookie,
    ExpectClientHelloWithCookie,
    ExpectClientCertificateOrKeyExchange,
    ExpectCertificateVerifyOrChangeCipherSpec,
    ExpectChangeCipherSpec,
    ExpectClientFinished,
    Done,
    Closed,
}

/// Server side DTLS 1.2 handshake for one peer.
///
/// Driven synchronously: the record layer hands in one decrypted record at a
/// time and transmits whatever flight comes back. Entries for the same peer
/// must be serialized by the caller; distinct peers get distinct instances.
pub struct ServerHandshake {
    options: Arc<ServerOptions>,
    /// Peer address string, bound into the stateless cookie.
    peer: String,
    cookies: CookieGenerator,
    record_protection: Box<dyn RecordProtection>,
    state: ServerState,
    session: Session,
    /// Transient handshake state; dropped once the session goes active.
    ctx: Option<HandshakeContext>,
    /// The terminal flight, kept after completion so a client that lost it
    /// can be answered with the identical bytes.
    last_flight: Option<Flight>,
}

struct HandshakeContext {
    transcript: Transcript,
    reassembler: Reassembler,
    queued: BTreeMap<u16, ReassembledMessage>,
    next_receive_seq: u16,
    next_send_seq: u16,
    suite_params: Option<CipherSuiteParams>,
    ecdhe: Option<EcdheContext>,
    key_schedule: Option<KeySchedule>,
    client_certificate: Option<Certificate>,
    client_public_key: Option<VerifyingKey>,
    certificate_verify_received: bool,
}

impl HandshakeContext {
    fn new() -> Self {
        Self {
            transcript: Transcript::new(),
            reassembler: Reassembler::new(),
            queued: BTreeMap::new(),
            next_receive_seq: 0,
            next_send_seq: 0,
            suite_params: None,
            ecdhe: None,
            key_schedule: None,
            client_certificate: None,
            client_public_key: None,
            certificate_verify_received: false,
        }
    }
}

impl ServerHandshake {
    pub fn new(
        options: Arc<ServerOptions>,
        peer: String,
        cookies: CookieGenerator,
        record_protection: Box<dyn RecordProtection>,
    ) -> Self {
        Self {
            options,
            peer,
            cookies,
            record_protection,
            state: ServerState::ExpectClientHelloNoCookie,
            session: Session::new(),
            ctx: Some(HandshakeContext::new()),
            last_flight: None,
        }
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn is_established(&self) -> bool {
        self.session.active
    }

    /// Transfers ownership of the negotiated session to the record layer.
    pub fn into_session(self) -> Session {
        self.session
    }

    /// Feeds one decrypted record into the state machine. Returns the flight
    /// to transmit, if any. On a fatal error the handshake state is released
    /// and the caller must deliver the alert carried by the error before
    /// tearing down.
    pub fn process_record(&mut self, record: Record) -> Result<Option<Flight>> {
        let result = self.process_record_inner(record);

        if result.is_err() {
            // Peer faults and local faults both end the handshake. Only
            // last_flight survives, for late duplicate Finished handling.
            self.ctx = None;
            self.state = ServerState::Closed;
        }

        result
    }

    /// Emits a close_notify and drops all handshake state.
    pub fn close(&mut self) -> Flight {
        let mut data = vec![];
        Alert::close_notify().serialize(&mut data);

        let mut flight = Flight::new(false);
        flight.push(ContentType::alert, self.session.write_epoch, Bytes::from(data));

        self.ctx = None;
        self.state = ServerState::Closed;
        flight
    }

    fn process_record_inner(&mut self, record: Record) -> Result<Option<Flight>> {
        match record.typ {
            ContentType::handshake => self.process_handshake_record(record),
            ContentType::change_cipher_spec => self.process_change_cipher_spec(record),
            ContentType::alert => self.process_alert(record),
            ContentType::application_data => {
                if matches!(self.state, ServerState::Done | ServerState::Closed) {
                    // Not ours; the record layer routes application data.
                    Ok(None)
                } else {
                    Err(Error::fatal(
                        AlertDescription::unexpected_message,
                        "Application data during handshake",
                    ))
                }
            }
            _ => {
                debug!("Ignoring record with unknown content type from {}", self.peer);
                Ok(None)
            }
        }
    }

    fn process_handshake_record(&mut self, record: Record) -> Result<Option<Flight>> {
        let mut c = Cursor::new(record.fragment);
        let mut flight: Option<Flight> = None;

        // A record may pack several handshake fragments.
        while !c.is_empty() {
            let fragment = match HandshakeFragment::parse(&mut c) {
                Ok(f) => f,
                Err(_) => {
                    debug!("Dropping truncated handshake record from {}", self.peer);
                    break;
                }
            };

            if let Some(out) = self.process_handshake_fragment(fragment)? {
                if flight.is_some() {
                    warn!("Multiple flights from one record; keeping the last");
                }
                flight = Some(out);
            }
        }

        Ok(flight)
    }

    fn process_handshake_fragment(&mut self, fragment: HandshakeFragment) -> Result<Option<Flight>> {
        match self.state {
            ServerState::Done => {
                if fragment.msg_type == HandshakeType::Finished {
                    // The client is repeating its Finished, so it never saw
                    // our terminal flight. Re-emit it verbatim.
                    return Ok(self.last_flight.clone());
                }
                return Ok(None);
            }
            ServerState::Closed => return Ok(None),
            _ => {}
        }

        let ctx = self.ctx_mut()?;
        let completed = match ctx.reassembler.insert(fragment) {
            Ok(Some(msg)) => msg,
            Ok(None) => return Ok(None),
            Err(_) => {
                debug!("Dropping inconsistent handshake fragment from {}", self.peer);
                return Ok(None);
            }
        };

        // A ClientHello restarts sequence tracking (the client may retry
        // with a cookie, or retransmit after losing our HelloVerifyRequest),
        // so route it around the duplicate check.
        if completed.msg_type == HandshakeType::ClientHello && self.expecting_client_hello() {
            return self.advance(completed);
        }

        let ctx = self.ctx_mut()?;
        if completed.message_seq < ctx.next_receive_seq {
            debug!("Ignoring duplicate handshake message seq={}", completed.message_seq);
            return Ok(None);
        }

        if completed.message_seq > ctx.next_receive_seq {
            if ctx.queued.len() >= MAX_QUEUED_MESSAGES {
                debug!("Dropping out of order message seq={}", completed.message_seq);
            } else {
                ctx.queued.insert(completed.message_seq, completed);
            }
            return Ok(None);
        }

        self.advance(completed)
    }

    /// Dispatches one in-sequence message, then keeps consuming queued
    /// messages for as long as the next expected sequence is ready.
    fn advance(&mut self, first: ReassembledMessage) -> Result<Option<Flight>> {
        let mut flight = None;
        let mut next = Some(first);

        while let Some(msg) = next.take() {
            if let Some(out) = self.dispatch_message(msg)? {
                if flight.is_some() {
                    warn!("Multiple flights while draining queue; keeping the last");
                }
                flight = Some(out);
            }

            next = self.take_next_queued();
        }

        Ok(flight)
    }

    fn take_next_queued(&mut self) -> Option<ReassembledMessage> {
        let state = self.state;
        let ctx = self.ctx.as_mut()?;

        let msg = ctx.queued.get(&ctx.next_receive_seq)?;

        // A Finished that raced ahead of the ChangeCipherSpec stays queued
        // until the cipher spec gate has been passed.
        if msg.msg_type == HandshakeType::Finished && state != ServerState::ExpectClientFinished {
            return None;
        }

        let seq = ctx.next_receive_seq;
        ctx.queued.remove(&seq)
    }

    fn dispatch_message(&mut self, msg: ReassembledMessage) -> Result<Option<Flight>> {
        // HelloRequest only ever flows server to client.
        if msg.msg_type == HandshakeType::HelloRequest {
            return Err(unexpected("HelloRequest sent to a server"));
        }

        let raw = single_fragment_bytes(&msg);

        let parsed = Handshake::parse(
            msg.msg_type,
            msg.body.clone(),
            self.session.receive_raw_public_key,
        )
        .map_err(|_| {
            Error::fatal(
                AlertDescription::handshake_failure,
                "Malformed handshake message",
            )
        })?;

        self.ctx_mut()?.next_receive_seq = msg.message_seq.wrapping_add(1);

        match self.state {
            ServerState::ExpectClientHelloNoCookie | ServerState::ExpectClientHelloWithCookie => {
                match parsed {
                    Handshake::ClientHello(hello) => self.handle_client_hello(hello, raw),
                    _ => Err(unexpected("Expected ClientHello")),
                }
            }
            ServerState::ExpectClientCertificateOrKeyExchange => match parsed {
                Handshake::Certificate(certificate) => {
                    self.handle_client_certificate(certificate, raw)
                }
                Handshake::ClientKeyExchange(cke) => self.handle_client_key_exchange(cke, raw),
                _ => Err(unexpected("Expected Certificate or ClientKeyExchange")),
            },
            ServerState::ExpectCertificateVerifyOrChangeCipherSpec => match parsed {
                Handshake::CertificateVerify(cv) => self.handle_certificate_verify(cv, raw),
                _ => Err(unexpected("Expected CertificateVerify")),
            },
            ServerState::ExpectChangeCipherSpec => {
                Err(unexpected("Expected ChangeCipherSpec"))
            }
            ServerState::ExpectClientFinished => match parsed {
                Handshake::Finished(finished) => self.handle_client_finished(finished, raw),
                _ => Err(unexpected("Expected Finished")),
            },
            ServerState::Done | ServerState::Closed => Ok(None),
        }
    }

    fn handle_client_hello(&mut self, hello: ClientHello, raw: Bytes) -> Result<Option<Flight>> {
        // The server implements exactly DTLS 1.2. Anything newer negotiates
        // down to 1.2; anything older is refused.
        if hello.client_version.older_than(&DTLS_1_2) {
            return Err(Error::fatal(
                AlertDescription::protocol_version,
                "Client version below DTLS 1.2",
            ));
        }

        if !self.cookies.verify(&self.peer, &hello) {
            // First contact, or a stale/forged cookie: issue a fresh cookie
            // and keep no state about the exchange. The hello is not part of
            // the transcript.
            let cookie = self.cookies.generate(&self.peer, &hello);
            let hvr = Handshake::HelloVerifyRequest(HelloVerifyRequest {
                server_version: DTLS_1_2,
                cookie,
            });

            let epoch = self.session.write_epoch;
            let ctx = self.ctx_mut()?;
            let data = serialize_single_fragment(&hvr, ctx.next_send_seq);
            ctx.next_send_seq += 1;

            let mut flight = Flight::new(false);
            flight.push(ContentType::handshake, epoch, data);

            self.state = ServerState::ExpectClientHelloWithCookie;
            return Ok(Some(flight));
        }

        let negotiated = negotiate(&self.options, &hello)?;

        self.session.client_random = hello.random.clone();
        self.session.server_random = generate_random();
        self.session.session_id = {
            let mut id = vec![0u8; 32];
            secure_random_bytes(&mut id);
            Bytes::from(id)
        };
        self.session.cipher_suite = negotiated.params.suite;
        self.session.compression_method = 0;
        self.session.receive_raw_public_key =
            negotiated.client_certificate_type == Some(CertificateType::RawPublicKey);
        self.session.send_raw_public_key =
            negotiated.server_certificate_type == Some(CertificateType::RawPublicKey);

        let mut extensions = vec![];
        if let Some(typ) = negotiated.client_certificate_type {
            extensions.push(Extension::ClientCertificateTypeSelected(typ));
        }
        if let Some(typ) = negotiated.server_certificate_type {
            extensions.push(Extension::ServerCertificateTypeSelected(typ));
        }
        if negotiated.params.key_exchange == KeyExchangeAlgorithm::EcDiffieHellman {
            extensions.push(Extension::ECPointFormats(ECPointFormatList::uncompressed_only()));
        }

        let server_hello = ServerHello {
            server_version: DTLS_1_2,
            random: self.session.server_random.clone(),
            session_id: self.session.session_id.clone(),
            cipher_suite: negotiated.params.suite,
            compression_method: 0,
            extensions,
        };

        // Construct the conditional flight members before any of them are
        // appended, so the private key borrow ends first.
        let mut certificate_msg = None;
        let mut server_key_exchange_msg = None;
        let mut certificate_request_msg = None;
        let mut ecdhe = None;

        if negotiated.params.key_exchange == KeyExchangeAlgorithm::EcDiffieHellman {
            let curve = negotiated
                .curve
                .ok_or(Error::Internal("EC suite without a negotiated curve"))?;
            let credentials = self
                .options
                .credentials
                .as_ref()
                .ok_or(Error::Internal("EC suite without credentials"))?;

            certificate_msg = Some(Handshake::Certificate(if self.session.send_raw_public_key {
                Certificate::RawPublicKey(credentials.raw_public_key.clone())
            } else {
                Certificate::X509(credentials.chain.clone())
            }));

            let context = EcdheContext::generate();
            let params = ServerEcdhParams {
                curve_params: ECParameters {
                    curve_type: ECCurveType::named_curve,
                    named_curve: curve,
                },
                public: ECPoint {
                    point: context.public_point().clone(),
                },
            };

            // The signature covers both randoms and the ECDH parameters
            // (RFC 4492 5.4).
            let mut signed = vec![];
            signed.extend_from_slice(&self.session.client_random);
            signed.extend_from_slice(&self.session.server_random);
            params.serialize(&mut signed);
            let signature = sign_sha256_ecdsa(&credentials.private_key, &signed);

            server_key_exchange_msg = Some(Handshake::ServerKeyExchange(ServerKeyExchangeEcdhe {
                params,
                signed_params: CertificateVerify {
                    algorithm: SignatureAndHashAlgorithm::sha256_ecdsa(),
                    signature: Bytes::from(signature),
                },
            }));
            ecdhe = Some(context);

            if self.options.client_authentication_required {
                certificate_request_msg = Some(Handshake::CertificateRequest(CertificateRequest {
                    certificate_types: vec![ClientCertificateType::ecdsa_sign],
                    supported_signature_algorithms: SignatureAndHashAlgorithmList {
                        algorithms: vec![SignatureAndHashAlgorithm::sha256_ecdsa()],
                    },
                    certificate_authorities: self.options.certificate_authorities.clone(),
                }));
            }
        }

        {
            let ctx = self.ctx_mut()?;
            ctx.transcript.push(&raw);
            ctx.suite_params = Some(negotiated.params);
            ctx.ecdhe = ecdhe;
        }

        let mut flight = Flight::new(true);
        self.append_handshake(&mut flight, Handshake::ServerHello(server_hello))?;
        if let Some(msg) = certificate_msg {
            self.append_handshake(&mut flight, msg)?;
        }
        if let Some(msg) = server_key_exchange_msg {
            self.append_handshake(&mut flight, msg)?;
        }
        if let Some(msg) = certificate_request_msg {
            self.append_handshake(&mut flight, msg)?;
        }
        self.append_handshake(&mut flight, Handshake::ServerHelloDone)?;

        self.state = ServerState::ExpectClientCertificateOrKeyExchange;
        Ok(Some(flight))
    }

    fn handle_client_certificate(
        &mut self,
        certificate: Certificate,
        raw: Bytes,
    ) -> Result<Option<Flight>> {
        if self.ctx_ref()?.client_certificate.is_some() {
            debug!("Ignoring repeated Certificate from {}", self.peer);
            return Ok(None);
        }

        // An empty certificate is the client declining authentication; if it
        // was mandatory, that surfaces at Finished time. A certificate may
        // also arrive unsolicited, and is verified all the same.
        let public_key = if certificate.is_empty() {
            None
        } else {
            let verifier = self.options.trust_anchors.as_ref().ok_or(Error::fatal(
                AlertDescription::handshake_failure,
                "No trust anchors for the client certificate",
            ))?;

            Some(verifier.verify(&certificate).map_err(|_| {
                Error::fatal(
                    AlertDescription::handshake_failure,
                    "Client certificate not trusted",
                )
            })?)
        };

        let ctx = self.ctx_mut()?;
        ctx.client_certificate = Some(certificate);
        ctx.client_public_key = public_key;
        ctx.transcript.push(&raw);
        Ok(None)
    }

    fn handle_client_key_exchange(
        &mut self,
        cke: ClientKeyExchange,
        raw: Bytes,
    ) -> Result<Option<Flight>> {
        let params = self
            .ctx_ref()?
            .suite_params
            .ok_or(Error::Internal("Suite parameters missing"))?;

        let pre_master_secret = match params.key_exchange {
            KeyExchangeAlgorithm::Psk => {
                let identity = cke.psk_identity().map_err(|_| {
                    Error::fatal(
                        AlertDescription::handshake_failure,
                        "Malformed PSK identity",
                    )
                })?;
                let identity = std::str::from_utf8(&identity).map_err(|_| {
                    Error::fatal(
                        AlertDescription::handshake_failure,
                        "PSK identity is not UTF-8",
                    )
                })?;

                let psk = self.options.preshared_keys.get(identity).ok_or(Error::fatal(
                    AlertDescription::handshake_failure,
                    "Unknown PSK identity",
                ))?;

                psk_premaster_secret(psk)
            }
            KeyExchangeAlgorithm::EcDiffieHellman => {
                let point = cke.ecdh_point().map_err(|_| {
                    Error::fatal(
                        AlertDescription::handshake_failure,
                        "Malformed client EC point",
                    )
                })?;

                let ecdhe = self
                    .ctx_ref()?
                    .ecdhe
                    .as_ref()
                    .ok_or(Error::Internal("ECDHE context missing"))?;

                ecdhe.compute_premaster(&point).map_err(|_| {
                    Error::fatal(
                        AlertDescription::handshake_failure,
                        "Invalid client EC point",
                    )
                })?
            }
            KeyExchangeAlgorithm::Null => vec![],
        };

        let key_schedule = KeySchedule::create(
            params,
            &pre_master_secret,
            &self.session.client_random,
            &self.session.server_random,
        );
        self.session.master_secret = Bytes::copy_from_slice(key_schedule.master_secret());

        let ctx = self.ctx_mut()?;
        ctx.key_schedule = Some(key_schedule);
        ctx.transcript.push(&raw);

        self.state = ServerState::ExpectCertificateVerifyOrChangeCipherSpec;
        Ok(None)
    }

    fn handle_certificate_verify(
        &mut self,
        cv: CertificateVerify,
        raw: Bytes,
    ) -> Result<Option<Flight>> {
        let ctx = self.ctx_ref()?;
        let public_key = ctx.client_public_key.clone().ok_or(unexpected(
            "CertificateVerify without a client certificate",
        ))?;

        if cv.algorithm != SignatureAndHashAlgorithm::sha256_ecdsa() {
            return Err(Error::fatal(
                AlertDescription::handshake_failure,
                "Unsupported CertificateVerify algorithm",
            ));
        }

        // The signature covers the concatenation of every handshake message
        // exchanged so far, ending just before this one.
        verify_sha256_ecdsa(&public_key, ctx.transcript.raw_bytes(), &cv.signature).map_err(
            |_| {
                Error::fatal(
                    AlertDescription::decrypt_error,
                    "Invalid CertificateVerify signature",
                )
            },
        )?;

        let ctx = self.ctx_mut()?;
        ctx.certificate_verify_received = true;
        ctx.transcript.push(&raw);

        self.state = ServerState::ExpectChangeCipherSpec;
        Ok(None)
    }

    fn process_change_cipher_spec(&mut self, record: Record) -> Result<Option<Flight>> {
        match self.state {
            ServerState::ExpectCertificateVerifyOrChangeCipherSpec
            | ServerState::ExpectChangeCipherSpec => {}
            ServerState::ExpectClientFinished | ServerState::Done | ServerState::Closed => {
                // Duplicate, or a repeat from a client that lost our
                // terminal flight; the Finished that follows it triggers
                // the replay.
                return Ok(None);
            }
            _ => {
                return Err(unexpected("ChangeCipherSpec before key exchange"));
            }
        }

        if record.fragment.len() != 1 || record.fragment[0] != 1 {
            debug!("Dropping malformed ChangeCipherSpec from {}", self.peer);
            return Ok(None);
        }

        let spec = {
            let ctx = self.ctx_ref()?;
            let key_schedule = ctx
                .key_schedule
                .as_ref()
                .ok_or(Error::Internal("Key schedule missing"))?;
            key_schedule.client_cipher_spec()
        };

        let epoch = self.session.read_epoch + 1;
        self.record_protection.install_read_state(epoch, spec);
        self.session.read_epoch = epoch;

        self.state = ServerState::ExpectClientFinished;

        // The Finished may already have been reassembled and parked.
        match self.take_next_queued() {
            Some(msg) => self.advance(msg),
            None => Ok(None),
        }
    }

    fn handle_client_finished(&mut self, finished: Finished, raw: Bytes) -> Result<Option<Flight>> {
        let params = self
            .ctx_ref()?
            .suite_params
            .ok_or(Error::Internal("Suite parameters missing"))?;

        // Mandatory authentication: with ECDHE and required client auth, the
        // handshake must have carried a certificate and its proof of
        // possession.
        if params.key_exchange == KeyExchangeAlgorithm::EcDiffieHellman
            && self.options.client_authentication_required
        {
            let ctx = self.ctx_ref()?;
            let have_certificate = ctx
                .client_certificate
                .as_ref()
                .map(|c| !c.is_empty())
                .unwrap_or(false);

            if !have_certificate || !ctx.certificate_verify_received {
                return Err(Error::fatal(
                    AlertDescription::handshake_failure,
                    "Client authentication required but not provided",
                ));
            }
        }

        // Verify against the transcript as it stood before this message.
        let expected = {
            let ctx = self.ctx_ref()?;
            let key_schedule = ctx
                .key_schedule
                .as_ref()
                .ok_or(Error::Internal("Key schedule missing"))?;
            key_schedule.verify_data_client(&ctx.transcript.digest())
        };

        if expected[..] != finished.verify_data[..] {
            return Err(Error::fatal(
                AlertDescription::decrypt_error,
                "Finished verify_data mismatch",
            ));
        }

        self.ctx_mut()?.transcript.push(&raw);

        // Terminal flight: ChangeCipherSpec under the old epoch, then our
        // Finished under the new one. Not rescheduled on a timer, but kept
        // for duplicate client Finished handling.
        let mut flight = Flight::new(false);
        flight.push(
            ContentType::change_cipher_spec,
            self.session.write_epoch,
            Bytes::from_static(&[1]),
        );

        let spec = {
            let ctx = self.ctx_ref()?;
            let key_schedule = ctx
                .key_schedule
                .as_ref()
                .ok_or(Error::Internal("Key schedule missing"))?;
            key_schedule.server_cipher_spec()
        };
        let epoch = self.session.write_epoch + 1;
        self.record_protection.install_write_state(epoch, spec);
        self.session.write_epoch = epoch;

        // Our Finished covers the transcript including the client's.
        let verify_data = {
            let ctx = self.ctx_ref()?;
            let key_schedule = ctx
                .key_schedule
                .as_ref()
                .ok_or(Error::Internal("Key schedule missing"))?;
            key_schedule.verify_data_server(&ctx.transcript.digest())
        };

        self.append_handshake(
            &mut flight,
            Handshake::Finished(Finished {
                verify_data: Bytes::from(verify_data),
            }),
        )?;

        self.session.active = true;
        self.last_flight = Some(flight.clone());
        self.state = ServerState::Done;
        self.ctx = None;

        Ok(Some(flight))
    }

    fn process_alert(&mut self, record: Record) -> Result<Option<Flight>> {
        let mut c = Cursor::new(record.fragment);
        let alert = match Alert::parse(&mut c) {
            Ok(alert) => alert,
            Err(_) => {
                debug!("Dropping truncated alert from {}", self.peer);
                return Ok(None);
            }
        };

        if alert.description == AlertDescription::close_notify {
            return Err(Error::PeerClosed);
        }

        if alert.level == AlertLevel::fatal {
            return Err(Error::PeerAlert(alert.description));
        }

        debug!(
            "Ignoring warning alert {:?} from {}",
            alert.description, self.peer
        );
        Ok(None)
    }

    /// Frames a message as a single-fragment handshake record, assigns the
    /// next send sequence, and folds it into the transcript.
    fn append_handshake(&mut self, flight: &mut Flight, msg: Handshake) -> Result<()> {
        let epoch = self.session.write_epoch;
        let ctx = self.ctx_mut()?;

        let data = serialize_single_fragment(&msg, ctx.next_send_seq);
        ctx.next_send_seq += 1;
        ctx.transcript.push(&data);

        flight.push(ContentType::handshake, epoch, data);
        Ok(())
    }

    fn expecting_client_hello(&self) -> bool {
        matches!(
            self.state,
            ServerState::ExpectClientHelloNoCookie | ServerState::ExpectClientHelloWithCookie
        )
    }

    fn ctx_ref(&self) -> Result<&HandshakeContext> {
        self.ctx.as_ref().ok_or(Error::Internal("Handshake context missing"))
    }

    fn ctx_mut(&mut self) -> Result<&mut HandshakeContext> {
        self.ctx.as_mut().ok_or(Error::Internal("Handshake context missing"))
    }
}

fn unexpected(reason: &'static str) -> Error {
    Error::fatal(AlertDescription::unexpected_message, reason)
}

struct Negotiation {
    params: CipherSuiteParams,
    curve: Option<NamedCurve>,
    client_certificate_type: Option<CertificateType>,
    server_certificate_type: Option<CertificateType>,
}

fn negotiate(options: &ServerOptions, hello: &ClientHello) -> Result<Negotiation> {
    // Only null compression is supported, and the client must offer it.
    if !hello.compression_methods.contains(&0) {
        return Err(Error::fatal(
            AlertDescription::handshake_failure,
            "Client does not offer null compression",
        ));
    }

    // First client preference that we also support wins. The null suite is
    // in our supported list but never negotiable.
    let mut selected = None;
    for suite in &hello.cipher_suites {
        if *suite == CipherSuite::SSL_NULL_WITH_NULL_NULL {
            continue;
        }
        if !options.supported_cipher_suites.contains(suite) {
            continue;
        }

        let params = match suite.decode() {
            Ok(params) => params,
            Err(_) => continue,
        };

        if params.key_exchange == KeyExchangeAlgorithm::EcDiffieHellman
            && options.credentials.is_none()
        {
            continue;
        }

        selected = Some(params);
        break;
    }

    let params = selected.ok_or(Error::fatal(
        AlertDescription::handshake_failure,
        "No common cipher suite",
    ))?;

    let mut curve = None;
    if params.key_exchange == KeyExchangeAlgorithm::EcDiffieHellman {
        let offered = find_elliptic_curves(&hello.extensions).ok_or(Error::fatal(
            AlertDescription::handshake_failure,
            "EC suite without supported_elliptic_curves",
        ))?;

        curve = offered
            .curves
            .iter()
            .find(|c| options.supported_curves.contains(*c))
            .copied();

        if curve.is_none() {
            return Err(Error::fatal(
                AlertDescription::handshake_failure,
                "No common named curve",
            ));
        }
    }

    let client_certificate_type = match find_client_certificate_types(&hello.extensions) {
        Some(list) => Some(select_certificate_type(list)?),
        None => None,
    };
    let server_certificate_type = match find_server_certificate_types(&hello.extensions) {
        Some(list) => Some(select_certificate_type(list)?),
        None => None,
    };

    Ok(Negotiation {
        params,
        curve,
        client_certificate_type,
        server_certificate_type,
    })
}

/// Intersects the client's preference list with the types we support and
/// picks the client's first match.
fn select_certificate_type(list: &CertificateTypeList) -> Result<CertificateType> {
    list.types
        .iter()
        .find(|t| SUPPORTED_CERTIFICATE_TYPES.contains(*t))
        .copied()
        .ok_or(Error::fatal(
            AlertDescription::handshake_failure,
            "No common certificate type",
        ))
}

/// Reconstructs the single-fragment wire form of a reassembled message for
/// the transcript.
fn single_fragment_bytes(msg: &ReassembledMessage) -> Bytes {
    let mut out = vec![];
    msg.msg_type.serialize(&mut out);
    serialize_u24(msg.body.len() as u32, &mut out);
    out.extend_from_slice(&msg.message_seq.to_be_bytes());
    serialize_u24(0, &mut out);
    serialize_u24(msg.body.len() as u32, &mut out);
    out.extend_from_slice(&msg.body);
    Bytes::from(out)
}
