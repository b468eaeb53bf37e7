// Copyright 2026 Anapaya Systems
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//   http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.
//! Persistent QUIC test suite.

use std::{
    net::SocketAddr,
    sync::{Arc, Once},
    time::Duration,
};

use assert_matches::assert_matches;
use colibri_reservation::{
    dataplane::{ColibriFlags, ColibriHopField, ColibriInfoField, ColibriPath},
    token::HopMac,
    types::{BwCls, Rlc, Tick},
};
use quinn::{Endpoint, ServerConfig, crypto::rustls::QuicClientConfig};
use rustls::pki_types::{CertificateDer, PrivateKeyDer, PrivatePkcs8KeyDer};
use scion_sdk_coliquic::{
    DataplanePath, Destination, Listener, ListenerError, PersistentQuic, PersistentQuicConfig,
    StreamConn,
};
use tokio::{
    io::{AsyncReadExt, AsyncWriteExt},
    sync::oneshot,
    task::JoinSet,
};

/// Sessions are reused for dials to the same destination.
#[test_log::test(tokio::test)]
#[ntest::timeout(10_000)]
async fn dial_reuses_session() {
    let env = TestEnv::new(PersistentQuicConfig::default(), PersistentQuicConfig::default());

    let listener = env.listener.clone();
    let server = tokio::spawn(async move {
        let mut addrs = Vec::new();
        for _ in 0..2 {
            let conn = echo_once(&listener).await;
            addrs.push((conn.local_addr(), conn.remote_addr()));
        }
        addrs
    });

    let mut first = env.dialer.dial(&env.dst).await.expect("no fail");
    assert_eq!(roundtrip(&mut first, b"first").await, b"first");
    let mut second = env.dialer.dial(&env.dst).await.expect("no fail");
    assert_eq!(roundtrip(&mut second, b"second").await, b"second");

    assert_eq!(first.session_id(), second.session_id());
    assert_eq!(env.dialer.session_count().await, 1);
    assert_eq!(first.local_addr(), env.client_addr);
    assert_eq!(first.remote_addr(), env.listener.local_addr());

    let addrs = server.await.expect("no fail");
    for (local, remote) in addrs {
        assert_eq!(local, env.listener.local_addr());
        assert_eq!(remote, env.client_addr);
    }
}

/// Sessions are keyed by the path, COLIBRI paths by their invariant representation.
#[test_log::test(tokio::test)]
#[ntest::timeout(10_000)]
async fn sessions_are_keyed_by_path() {
    let env = TestEnv::new(PersistentQuicConfig::default(), PersistentQuicConfig::default());

    let mut path = colibri_path(1);
    let a = env.destination(DataplanePath::colibri(&path).expect("no fail"));
    path.packet_timestamp = [9; 8];
    path.info_field.orig_pay_len = 1200;
    let a_later = env.destination(DataplanePath::colibri(&path).expect("no fail"));
    let b = env.destination(DataplanePath::colibri(&colibri_path(2)).expect("no fail"));

    let a_conn = env.dialer.dial(&a).await.expect("no fail");
    let a_later_conn = env.dialer.dial(&a_later).await.expect("no fail");
    let b_conn = env.dialer.dial(&b).await.expect("no fail");

    assert_eq!(a_conn.session_id(), a_later_conn.session_id());
    assert_ne!(a_conn.session_id(), b_conn.session_id());
    assert_eq!(env.dialer.session_count().await, 2);
}

/// A session closed by the peer is replaced on the next dial.
#[test_log::test(tokio::test)]
#[ntest::timeout(10_000)]
async fn redial_after_remote_close() {
    let env = TestEnv::new(PersistentQuicConfig::default(), PersistentQuicConfig::default());

    let (done_tx, done_rx) = oneshot::channel::<()>();
    let listener = env.listener.clone();
    let server = tokio::spawn(async move {
        let conn = echo_once(&listener).await;
        done_rx.await.expect("no fail");
        conn.connection().close(7u32.into(), b"bye");
        echo_once(&listener).await;
    });

    let mut first = env.dialer.dial(&env.dst).await.expect("no fail");
    assert_eq!(roundtrip(&mut first, b"first").await, b"first");
    done_tx.send(()).expect("no fail");
    let _ = first.connection().closed().await;

    let mut second = env.dialer.dial(&env.dst).await.expect("no fail");
    assert_eq!(roundtrip(&mut second, b"second").await, b"second");
    assert_ne!(first.session_id(), second.session_id());
    assert_eq!(env.dialer.session_count().await, 1);

    server.await.expect("no fail");
}

/// A session that runs out of streams is replaced on the next dial.
#[test_log::test(tokio::test)]
#[ntest::timeout(10_000)]
async fn redial_after_stream_exhaustion() {
    let env = TestEnv::new(
        PersistentQuicConfig::builder()
            .max_concurrent_bidi_streams(1)
            .build(),
        PersistentQuicConfig::builder()
            .stream_open_timeout(Duration::from_millis(200))
            .build(),
    );

    // Keeps the only stream of the first session open.
    let first = env.dialer.dial(&env.dst).await.expect("no fail");
    let second = env.dialer.dial(&env.dst).await.expect("no fail");

    assert_ne!(first.session_id(), second.session_id());
    assert_eq!(env.dialer.session_count().await, 1);
}

/// Concurrent dials to the same destination share one session.
#[test_log::test(tokio::test)]
#[ntest::timeout(10_000)]
async fn concurrent_dials_share_session() {
    let env = TestEnv::new(PersistentQuicConfig::default(), PersistentQuicConfig::default());

    let mut js = JoinSet::new();
    for _ in 0..8 {
        let dialer = env.dialer.clone();
        let dst = env.dst.clone();
        js.spawn(async move { dialer.dial(&dst).await.expect("no fail").session_id() });
    }
    let ids = js.join_all().await;

    assert_eq!(ids.len(), 8);
    assert!(ids.iter().all(|id| *id == ids[0]));
    assert_eq!(env.dialer.session_count().await, 1);
}

/// Closing the listener wakes blocked and future accepts with an error.
#[test_log::test(tokio::test)]
#[ntest::timeout(10_000)]
async fn accept_fails_after_close() {
    let env = TestEnv::new(PersistentQuicConfig::default(), PersistentQuicConfig::default());

    let listener = env.listener.clone();
    let blocked = tokio::spawn(async move { listener.accept().await.map(|_| ()) });
    tokio::time::sleep(Duration::from_millis(50)).await;

    env.listener.close();

    assert_matches!(blocked.await.expect("no fail"), Err(ListenerError::Closed));
    assert_matches!(env.listener.accept().await, Err(ListenerError::Closed));
}

struct TestEnv {
    listener: Arc<Listener>,
    dialer: Arc<PersistentQuic>,
    client_addr: SocketAddr,
    dst: Destination,
}

impl TestEnv {
    fn new(server: PersistentQuicConfig, client: PersistentQuicConfig) -> Self {
        install_rustls_crypto_provider();
        let (cert, key) = generate_cert();

        let server_config = ServerConfig::with_single_cert(vec![cert.clone()], key).expect("no fail");
        let listener =
            Listener::bind("127.0.0.1:0".parse().expect("no fail"), server_config, &server)
                .expect("no fail");

        let endpoint = Endpoint::client("127.0.0.1:0".parse().expect("no fail")).expect("no fail");
        let client_addr = endpoint.local_addr().expect("no fail");
        let dialer = PersistentQuic::new(endpoint, client_config(cert), &client).expect("no fail");

        let dst = Destination::new(listener.local_addr(), DataplanePath::Empty)
            .with_server_name("localhost");
        Self {
            listener: Arc::new(listener),
            dialer: Arc::new(dialer),
            client_addr,
            dst,
        }
    }

    fn destination(&self, path: DataplanePath) -> Destination {
        Destination::new(self.listener.local_addr(), path).with_server_name("localhost")
    }
}

fn install_rustls_crypto_provider() {
    static CRYPTO_INIT: Once = Once::new();
    CRYPTO_INIT.call_once(|| {
        let _ = rustls::crypto::ring::default_provider().install_default();
    });
}

fn generate_cert() -> (CertificateDer<'static>, PrivateKeyDer<'static>) {
    let certified = rcgen::generate_simple_self_signed(vec!["localhost".into()]).expect("no fail");
    let key = PrivatePkcs8KeyDer::from(certified.key_pair.serialize_der());
    (certified.cert.der().clone(), key.into())
}

fn client_config(cert: CertificateDer<'static>) -> quinn::ClientConfig {
    let mut roots = rustls::RootCertStore::empty();
    roots.add(cert).expect("no fail");
    let crypto = rustls::ClientConfig::builder()
        .with_root_certificates(roots)
        .with_no_client_auth();
    quinn::ClientConfig::new(Arc::new(
        QuicClientConfig::try_from(crypto).expect("no fail"),
    ))
}

fn colibri_path(ver: u8) -> ColibriPath {
    ColibriPath {
        packet_timestamp: [0; 8],
        info_field: ColibriInfoField {
            flags: ColibriFlags::C | ColibriFlags::S,
            ver,
            curr_hf: 0,
            hf_count: 1,
            res_id_suffix: [1; 12],
            exp_tick: Tick(100),
            bw_cls: BwCls::new(5).expect("no fail"),
            rlc: Rlc(0),
            orig_pay_len: 0,
        },
        hop_fields: vec![ColibriHopField {
            ingress: 0,
            egress: 1,
            mac: HopMac([1, 2, 3, 4]),
        }],
    }
}

/// Accepts one stream, echoes everything it receives and finishes the stream.
async fn echo_once(listener: &Listener) -> StreamConn {
    let mut conn = listener.accept().await.expect("no fail");
    let mut buf = Vec::new();
    conn.read_to_end(&mut buf).await.expect("no fail");
    conn.write_all(&buf).await.expect("no fail");
    conn.finish().expect("no fail");
    conn
}

async fn roundtrip(conn: &mut StreamConn, msg: &[u8]) -> Vec<u8> {
    conn.write_all(msg).await.expect("no fail");
    conn.finish().expect("no fail");
    let mut buf = Vec::new();
    conn.read_to_end(&mut buf).await.expect("no fail");
    buf
}
