//! Integration-Tests: Orchestratoren ueber einen echten Relay
//!
//! Relay und Relay-Verbindung sind echt (axum + tokio-tungstenite),
//! Medien und Direkt-Transport kommen aus `speicher`.

use meshcall_core::types::{PeerId, RaumId};
use meshcall_mesh::speicher::{SpeicherMedien, SpeicherTransportAdapter};
use meshcall_mesh::{
    LinkZustand, MeshAdapter, MeshConfig, MeshEreignis, MeshHandle, MeshOrchestrator,
    StatischeZugangsdaten, WebSocketVerbinder,
};
use meshcall_observability::metrics::RelayMetriken;
use meshcall_signaling::{SignalingConfig, SignalingServer, SignalingState};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

async fn relay() -> String {
    let state = SignalingState::neu(SignalingConfig::default(), RelayMetriken::neu().unwrap());
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let url = format!("ws://{addr}{}", state.config.ws_pfad);
    tokio::spawn(SignalingServer::neu(state).starten(listener));
    url
}

struct Teilnehmer {
    id: PeerId,
    handle: MeshHandle,
    task: JoinHandle<()>,
    ereignisse: mpsc::UnboundedReceiver<MeshEreignis>,
    transport: Arc<SpeicherTransportAdapter>,
}

async fn teilnehmen(url: &str, raum: &str, name: &str) -> Teilnehmer {
    let transport = Arc::new(SpeicherTransportAdapter::automatisch());
    let config = MeshConfig::fuer_relay(url);
    let adapter = MeshAdapter {
        medien: Arc::new(SpeicherMedien::neu()),
        transport: transport.clone(),
        zugangsdaten: Arc::new(StatischeZugangsdaten::aus_config(&config)),
        relay: Arc::new(WebSocketVerbinder::neu()),
    };
    let (mut orch, ereignisse) = MeshOrchestrator::neu(config, adapter);
    let id = orch.start(RaumId::from(raum), name).await.unwrap();
    let (handle, task) = orch.spawnen();
    Teilnehmer {
        id,
        handle,
        task,
        ereignisse,
        transport,
    }
}

/// Sammelt Ereignisse bis `fertig` zutrifft
async fn warten_bis(
    t: &mut Teilnehmer,
    mut fertig: impl FnMut(&[MeshEreignis]) -> bool,
) -> Vec<MeshEreignis> {
    let mut gesammelt = Vec::new();
    tokio::time::timeout(Duration::from_secs(5), async {
        while !fertig(&gesammelt) {
            match t.ereignisse.recv().await {
                Some(e) => gesammelt.push(e),
                None => break,
            }
        }
    })
    .await
    .expect("Timeout beim Warten auf Mesh-Ereignisse");
    gesammelt
}

/// Remote-Medien pro Peer (Peer -> Anzeigename)
fn medien(ereignisse: &[MeshEreignis]) -> HashMap<PeerId, String> {
    ereignisse
        .iter()
        .filter_map(|e| match e {
            MeshEreignis::PeerMedien { peer_id, name, .. } => Some((peer_id.clone(), name.clone())),
            _ => None,
        })
        .collect()
}

fn verbunden(ereignisse: &[MeshEreignis]) -> usize {
    ereignisse
        .iter()
        .filter(|e| {
            matches!(
                e,
                MeshEreignis::LinkZustand {
                    zustand: LinkZustand::Connected,
                    ..
                }
            )
        })
        .count()
}

fn chats(ereignisse: &[MeshEreignis]) -> usize {
    ereignisse
        .iter()
        .filter(|e| matches!(e, MeshEreignis::Chat(_)))
        .count()
}

#[tokio::test]
async fn zwei_orchestratoren_verbinden_sich_mit_namen() {
    let url = relay().await;
    let mut a = teilnehmen(&url, "R1", "Alice").await;
    let mut b = teilnehmen(&url, "R1", "Bob").await;
    assert_ne!(a.id, b.id);

    let ea = warten_bis(&mut a, |e| medien(e).len() == 1).await;
    let eb = warten_bis(&mut b, |e| medien(e).len() == 1).await;

    assert_eq!(medien(&ea).get(&b.id).map(String::as_str), Some("Bob"));
    assert_eq!(medien(&eb).get(&a.id).map(String::as_str), Some("Alice"));
    assert_eq!(verbunden(&ea), 1);
    assert_eq!(verbunden(&eb), 1);

    // Nur Bob (neu beigetreten) hat ein Offer erzeugt und den Datenkanal geoeffnet
    assert!(ea
        .iter()
        .any(|e| matches!(e, MeshEreignis::PeerBeigetreten { name, .. } if name == "Bob")));
    let kanal_b = &b.transport.transport_fuer(&a.id).unwrap().kanaele();
    assert_eq!(kanal_b.len(), 1);
    assert_eq!(b.transport.transports().len(), 1);
    assert_eq!(a.transport.transports().len(), 1);

    // Bob geht, Alice erfaehrt es
    assert!(b.handle.schliessen());
    b.task.await.unwrap();
    let ea = warten_bis(&mut a, |e| {
        e.iter()
            .any(|e| matches!(e, MeshEreignis::PeerVerlassen { .. }))
    })
    .await;
    assert!(ea
        .iter()
        .any(|e| matches!(e, MeshEreignis::PeerVerlassen { peer_id } if *peer_id == b.id)));
    assert_eq!(a.transport.transport_fuer(&b.id).unwrap().schliess_anzahl(), 1);

    a.handle.schliessen();
    a.task.await.unwrap();
}

#[tokio::test]
async fn drei_peers_bilden_vollstaendiges_mesh() {
    let url = relay().await;
    let mut a = teilnehmen(&url, "R3", "A").await;
    let mut b = teilnehmen(&url, "R3", "B").await;
    warten_bis(&mut b, |e| medien(e).len() == 1).await;
    let mut c = teilnehmen(&url, "R3", "C").await;

    let ea = warten_bis(&mut a, |e| medien(e).len() == 2).await;
    let eb = warten_bis(&mut b, |e| medien(e).len() == 1).await;
    let ec = warten_bis(&mut c, |e| medien(e).len() == 2).await;

    let ma = medien(&ea);
    assert_eq!(ma.get(&b.id).map(String::as_str), Some("B"));
    assert_eq!(ma.get(&c.id).map(String::as_str), Some("C"));
    assert_eq!(medien(&eb).get(&c.id).map(String::as_str), Some("C"));
    let mc = medien(&ec);
    assert_eq!(mc.get(&a.id).map(String::as_str), Some("A"));
    assert_eq!(mc.get(&b.id).map(String::as_str), Some("B"));

    for t in [a, b, c] {
        t.handle.schliessen();
        t.task.await.unwrap();
    }
}

#[tokio::test]
async fn chat_echo_genau_einmal_fuer_null_eins_und_n_peers() {
    let url = relay().await;

    // 0 Peers
    let mut a = teilnehmen(&url, "R4", "A").await;
    a.handle.sende_chat("allein");
    let ea = warten_bis(&mut a, |e| chats(e) == 1).await;
    assert_eq!(chats(&ea), 1);

    // 1 Peer
    let mut b = teilnehmen(&url, "R4", "B").await;
    warten_bis(&mut b, |e| medien(e).len() == 1).await;
    b.handle.sende_chat("zu zweit");

    // N Peers
    let mut c = teilnehmen(&url, "R4", "C").await;
    warten_bis(&mut c, |e| medien(e).len() == 2).await;
    c.handle.sende_chat("zu dritt");

    let eb = warten_bis(&mut b, |e| chats(e) == 1).await;
    let ec = warten_bis(&mut c, |e| chats(e) == 1).await;
    tokio::time::sleep(Duration::from_millis(100)).await;
    while let Ok(e) = b.ereignisse.try_recv() {
        assert!(!matches!(e, MeshEreignis::Chat(_)));
    }
    while let Ok(e) = c.ereignisse.try_recv() {
        assert!(!matches!(e, MeshEreignis::Chat(_)));
    }
    assert!(eb
        .iter()
        .any(|e| matches!(e, MeshEreignis::Chat(m) if m.text == "zu zweit" && m.sender == "B")));
    assert!(ec
        .iter()
        .any(|e| matches!(e, MeshEreignis::Chat(m) if m.text == "zu dritt")));

    // C hat ueber beide Datenkanaele gesendet
    for ziel in [&a.id, &b.id] {
        let kanaele = c.transport.transport_fuer(ziel).unwrap().kanaele();
        assert_eq!(kanaele[0].gesendet().len(), 1);
    }

    for t in [a, b, c] {
        t.handle.schliessen();
        t.task.await.unwrap();
    }
}

#[tokio::test]
async fn mute_erreicht_andere_peers() {
    let url = relay().await;
    let mut a = teilnehmen(&url, "R5", "A").await;
    let mut b = teilnehmen(&url, "R5", "B").await;
    warten_bis(&mut b, |e| medien(e).len() == 1).await;
    warten_bis(&mut a, |e| medien(e).len() == 1).await;

    b.handle.audio_umschalten();
    let ea = warten_bis(&mut a, |e| {
        e.iter().any(|e| matches!(e, MeshEreignis::PeerStumm { .. }))
    })
    .await;
    assert!(ea.iter().any(
        |e| matches!(e, MeshEreignis::PeerStumm { peer_id, stumm: true } if *peer_id == b.id)
    ));

    for t in [a, b] {
        t.handle.schliessen();
        t.task.await.unwrap();
    }
}
