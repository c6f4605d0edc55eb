//! Replay of capture files through the daemon wiring

use pretty_assertions::assert_eq;
use std::fs::File;
use std::io::BufWriter;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use xeth::*;
use xeth_syncd::{ReplayStats, SyncdConfig, SyncdError, XethSync, write_record};

fn write_capture(path: &Path, msgs: &[Msg]) {
    let mut writer = BufWriter::new(File::create(path).unwrap());
    for msg in msgs {
        write_record(&mut writer, &msg.encode().unwrap()).unwrap();
    }
}

fn port(xid: u32, netns: u64, ifindex: i32) -> Msg {
    Msg::IfInfo(
        IfInfo::new(Xid(xid), IfInfoReason::Dump)
            .with_name(&format!("swp{xid}"))
            .with_kind(DevKind::Port)
            .with_location(NetNs(netns), ifindex),
    )
}

fn light(xid: u32, reason: IfInfoReason) -> Msg {
    Msg::IfInfo(IfInfo::new(Xid(xid), reason))
}

#[tokio::test]
async fn test_two_sources_share_registry() {
    let dir = tempfile::tempdir().unwrap();
    let a = dir.path().join("a.bin");
    let b = dir.path().join("b.bin");

    let mut stream_a: Vec<Msg> = (1..=32).map(|xid| port(xid, 1, xid as i32)).collect();
    stream_a.extend((1..=32).map(|xid| light(xid, IfInfoReason::Up)));
    stream_a.push(Msg::Break);

    let mut stream_b = vec![Msg::NetNsAdd(NetNs(42))];
    stream_b.extend((101..=132).map(|xid| port(xid, 42, (xid - 100) as i32)));
    write_capture(&a, &stream_a);
    write_capture(&b, &stream_b);

    let metrics = MetricsCollector::new().unwrap();
    let sync = XethSync::new(Arc::new(Reconciler::with_metrics(metrics.clone())));
    let stats = sync.run(&[a, b]).await.unwrap();

    assert_eq!(
        stats,
        ReplayStats {
            messages: 65 + 33,
            notes: 65 + 33,
            decode_errors: 0
        }
    );

    let engine = sync.engine();
    assert_eq!(engine.links().len(), 64);
    assert!(engine.dump_done());
    assert!(engine.links().lookup(Xid(5)).unwrap().is_up());
    assert!(!engine.links().lookup(Xid(105)).unwrap().is_up());
    assert_eq!(engine.netns().resolve(NetNs(42), 5), Xid(105));
    assert_eq!(engine.netns().resolve(NetNs::DEFAULT, 5), Xid(5));
    assert!(metrics.gather_metrics().contains("xeth_links 64"));
}

#[tokio::test]
async fn test_missing_source_reported_after_others_finish() {
    let dir = tempfile::tempdir().unwrap();
    let good = dir.path().join("good.bin");
    write_capture(&good, &[port(7, 1, 3)]);

    let sync = XethSync::new(Arc::new(Reconciler::new()));
    let result = sync
        .run(&[PathBuf::from("/nonexistent/capture.bin"), good])
        .await;

    assert!(matches!(result, Err(SyncdError::Transport(_))));
    assert!(sync.engine().links().contains(Xid(7)));
}

#[tokio::test]
async fn test_namespace_move_through_capture() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("move.bin");
    write_capture(
        &path,
        &[
            port(7, 1, 3),
            Msg::IfInfo(IfInfo::new(Xid(7), IfInfoReason::Unreg).with_location(NetNs::DEFAULT, 0)),
            Msg::IfInfo(IfInfo::new(Xid(7), IfInfoReason::Reg).with_location(NetNs(42), 5)),
        ],
    );

    let sync = XethSync::new(Arc::new(Reconciler::new()));
    let mut notes = sync.subscribe();
    sync.run(&[path]).await.unwrap();

    let mut seen = Vec::new();
    while let Ok(note) = notes.try_recv() {
        seen.push(note);
    }
    assert_eq!(
        seen,
        vec![
            Note::DevNew { xid: Xid(7) },
            Note::DevUnreg { xid: Xid(7) },
            Note::DevReg { xid: Xid(7) },
        ]
    );

    let state = sync.state();
    assert_eq!(state.links[0].netns(), NetNs(42));
    let ns42 = state
        .namespaces
        .iter()
        .find(|ns| ns.netns == NetNs(42))
        .unwrap();
    assert_eq!(ns42.entries, vec![(5, Xid(7))]);
}

#[test]
fn test_config_file_drives_sources() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("xethsyncd.toml");
    std::fs::write(
        &path,
        r#"
[transport]
sources = ["/var/lib/xeth/ns1.bin", "/var/lib/xeth/ns2.bin"]

[logging]
level = "debug"

[metrics]
dump_on_exit = true
"#,
    )
    .unwrap();

    let config = SyncdConfig::load_or_default(&path).unwrap();
    config.validate().unwrap();
    assert_eq!(config.transport.sources.len(), 2);
    assert_eq!(config.logging.level, "debug");
    assert!(config.metrics.dump_on_exit);
}
