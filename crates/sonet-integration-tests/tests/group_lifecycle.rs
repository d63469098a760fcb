//! Integration test: group lifecycle through the public engine API.
//!
//! Walks a group from creation through adds, removals, metadata updates,
//! welcomes, and commits, checking epochs, membership, and key material
//! after each step.

use sonet_integration_tests::{engine_with_group, init_tracing, key_package};
use sonet_mls::codec::deserialize_group;
use sonet_mls::key_schedule::KeySchedulePolicy;
use sonet_mls::tree::TreeHashMode;
use sonet_mls::{
    CipherSuite, GroupState, KeyPackageBundle, MlsConfig, MlsError, MlsProtocol, Proposal,
    SizeStatus,
};

#[test]
fn test_concrete_scenarios() {
    init_tracing();
    let engine = MlsProtocol::default();

    // 1. create
    let bytes = engine
        .create_group(b"G1", CipherSuite::default(), b"")
        .expect("create");
    let group = deserialize_group(&bytes).expect("decode");
    assert_eq!(group.epoch, 0);
    assert_eq!(group.tree.len(), 1);
    assert!(group.tree.nodes()[0].leaf.is_none());
    assert_eq!(group.state, GroupState::Active);

    // 2. add
    let kp1 = key_package().expect("kp");
    let group = deserialize_group(&engine.add_member(b"G1", &kp1).expect("add")).expect("decode");
    assert_eq!(group.epoch, 1);
    assert_eq!(engine.member_count(b"G1").expect("count"), 1);

    // 3. encrypt / decrypt
    let payload = engine.encrypt_message(b"G1", b"hello", b"").expect("encrypt");
    assert_eq!(
        engine.decrypt_message(b"G1", &payload, b"").expect("decrypt"),
        b"hello"
    );

    // 4. remove, then remove again
    let group = deserialize_group(&engine.remove_member(b"G1", 0).expect("remove")).expect("decode");
    assert_eq!(group.epoch, 2);
    assert_eq!(engine.member_count(b"G1").expect("count"), 0);
    assert!(matches!(
        engine.remove_member(b"G1", 0),
        Err(MlsError::InvalidIndex { index: 0, .. })
    ));
    assert_eq!(engine.group(b"G1").expect("group").epoch, 2);
}

#[test]
fn test_epoch_increases_by_one_per_operation() {
    let engine = engine_with_group(MlsConfig::default(), b"epochs").expect("engine");
    let mut expected = 0;
    for round in 0..10u32 {
        let encoded = match round % 3 {
            0 => engine.add_member(b"epochs", &key_package().expect("kp")),
            1 => engine.update_group(b"epochs", &round.to_le_bytes()),
            _ => engine.remove_member(b"epochs", 0),
        }
        .expect("transition");
        expected += 1;
        assert_eq!(deserialize_group(&encoded).expect("decode").epoch, expected);
    }
}

#[test]
fn test_capacity_of_default_group() {
    let engine = engine_with_group(MlsConfig::default(), b"big").expect("engine");
    let kp = key_package().expect("kp");

    for n in 1..=500 {
        engine.add_member(b"big", &kp).expect("add within capacity");
        if n == 300 {
            assert_eq!(engine.size_status(b"big").expect("status"), SizeStatus::Good);
        }
    }
    assert_eq!(engine.member_count(b"big").expect("count"), 500);
    assert_eq!(engine.size_status(b"big").expect("status"), SizeStatus::AtLimit);
    assert!(!engine.can_add_member(b"big").expect("can add"));

    assert_eq!(
        engine.add_member(b"big", &kp),
        Err(MlsError::GroupFull { max: 500 })
    );
    assert_eq!(engine.group(b"big").expect("group").epoch, 500);

    // Removing one member makes room again.
    engine.remove_member(b"big", 499).expect("remove");
    assert!(engine.can_add_member(b"big").expect("can add"));
}

#[test]
fn test_member_count_matches_tree() {
    let engine = engine_with_group(MlsConfig::default(), b"count").expect("engine");
    for _ in 0..6 {
        engine
            .add_member(b"count", &key_package().expect("kp"))
            .expect("add");
    }
    for index in [4, 0, 2] {
        engine.remove_member(b"count", index).expect("remove");
    }
    let group = engine.group(b"count").expect("group");
    let occupied = group.tree.nodes().iter().filter(|n| n.leaf.is_some()).count();
    assert_eq!(engine.member_count(b"count").expect("count"), occupied);
    assert_eq!(occupied, 3);
}

#[test]
fn test_tree_hash_always_matches_tree() {
    for mode in [TreeHashMode::Positional, TreeHashMode::Xor] {
        let config = MlsConfig {
            tree_hash: mode,
            ..MlsConfig::default()
        };
        let engine = engine_with_group(config, b"hash").expect("engine");
        for _ in 0..3 {
            engine
                .add_member(b"hash", &key_package().expect("kp"))
                .expect("add");
            let group = engine.group(b"hash").expect("group");
            assert_eq!(group.context.tree_hash, group.tree.compute_tree_hash(mode));
        }
        engine.remove_member(b"hash", 1).expect("remove");
        let group = engine.group(b"hash").expect("group");
        assert_eq!(group.context.tree_hash, group.tree.compute_tree_hash(mode));
    }
}

#[test]
fn test_group_ids_are_raw_bytes() {
    let engine = MlsProtocol::default();
    engine
        .create_group(b"a\0b", CipherSuite::default(), b"")
        .expect("create");
    engine
        .create_group(b"a", CipherSuite::default(), b"")
        .expect("create");

    engine
        .add_member(b"a\0b", &key_package().expect("kp"))
        .expect("add");
    assert_eq!(engine.member_count(b"a\0b").expect("count"), 1);
    assert_eq!(engine.member_count(b"a").expect("count"), 0);
    assert_eq!(engine.group_ids().len(), 2);
}

#[test]
fn test_messages_do_not_cross_groups() {
    let engine = engine_with_group(MlsConfig::default(), b"one").expect("engine");
    engine
        .create_group(b"two", CipherSuite::default(), b"")
        .expect("create");
    let payload = engine.encrypt_message(b"one", b"secret", b"").expect("encrypt");
    assert_eq!(
        engine.decrypt_message(b"two", &payload, b""),
        Err(MlsError::AuthenticationFailed)
    );
}

#[test]
fn test_every_suite_roundtrips() {
    let engine = MlsProtocol::default();
    for suite in CipherSuite::ALL {
        let id = suite.code().to_be_bytes();
        engine.create_group(&id, suite, b"").expect("create");
        let payload = engine.encrypt_message(&id, b"payload", b"ad").expect("encrypt");
        assert_eq!(
            engine.decrypt_message(&id, &payload, b"ad").expect("decrypt"),
            b"payload"
        );
    }
}

#[test]
fn test_welcome_flow() {
    let engine = engine_with_group(MlsConfig::default(), b"invite").expect("engine");
    let joiner = KeyPackageBundle::generate(CipherSuite::default(), b"").expect("bundle");

    engine
        .add_member(b"invite", &joiner.key_package)
        .expect("add");
    let welcome = engine
        .create_welcome(b"invite", &joiner.key_package)
        .expect("welcome");
    let secrets = welcome.open(&joiner.init_secret).expect("open");

    let group = engine.group(b"invite").expect("group");
    assert_eq!(welcome.epoch, group.epoch);
    assert_eq!(welcome.tree_hash, group.context.tree_hash);
    assert_eq!(secrets.epoch_secret(), group.secrets.epoch_secret());

    // The joiner can read traffic in the epoch it was welcomed into.
    let payload = engine.encrypt_message(b"invite", b"hi", b"").expect("encrypt");
    let (nonce, ciphertext) = payload.split_at(sonet_crypto::aead::NONCE_SIZE);
    let plaintext = sonet_crypto::aead::decrypt(
        group.cipher_suite.aead(),
        secrets.epoch_secret(),
        nonce,
        ciphertext,
        b"",
    )
    .expect("joiner decrypt");
    assert_eq!(plaintext, b"hi");
}

#[test]
fn test_commit_flow() {
    let engine = engine_with_group(MlsConfig::default(), b"commit").expect("engine");
    let committer = KeyPackageBundle::generate(CipherSuite::default(), b"").expect("bundle");

    let commit = engine
        .commit(
            b"commit",
            Proposal::Add(committer.key_package.leaf_node.clone()),
            &committer.signing_key,
        )
        .expect("commit");
    engine
        .verify_commit(b"commit", &commit, &committer.signing_key.verifying_key())
        .expect("verify");
    assert_eq!(engine.member_count(b"commit").expect("count"), 1);

    let update = engine
        .commit(
            b"commit",
            Proposal::GroupContextExtensions(b"renamed".to_vec()),
            &committer.signing_key,
        )
        .expect("commit");
    assert_ne!(update.confirmation_tag, commit.confirmation_tag);
    assert!(engine
        .verify_commit(b"commit", &commit, &committer.signing_key.verifying_key())
        .is_err());
    engine
        .verify_commit(b"commit", &update, &committer.signing_key.verifying_key())
        .expect("verify");
}

#[test]
fn test_chained_and_static_schedules() {
    let chained = engine_with_group(MlsConfig::default(), b"k").expect("engine");
    let fixed = engine_with_group(
        MlsConfig {
            key_schedule: KeySchedulePolicy::Static,
            ..MlsConfig::default()
        },
        b"k",
    )
    .expect("engine");

    let mut chained_secrets = vec![*chained.group(b"k").expect("group").secrets.epoch_secret()];
    let mut static_secrets = vec![*fixed.group(b"k").expect("group").secrets.epoch_secret()];
    for _ in 0..4 {
        chained.update_group(b"k", b"").expect("update");
        fixed.update_group(b"k", b"").expect("update");
        chained_secrets.push(*chained.group(b"k").expect("group").secrets.epoch_secret());
        static_secrets.push(*fixed.group(b"k").expect("group").secrets.epoch_secret());
    }

    chained_secrets.sort();
    chained_secrets.dedup();
    static_secrets.dedup();
    assert_eq!(chained_secrets.len(), 5);
    assert_eq!(static_secrets.len(), 1);
}

#[test]
fn test_creation_epoch_payload_unreadable_after_first_add() {
    let engine = engine_with_group(MlsConfig::default(), b"fresh").expect("engine");
    let before = engine.encrypt_message(b"fresh", b"before join", b"").expect("encrypt");

    engine
        .add_member(b"fresh", &key_package().expect("kp"))
        .expect("add");

    assert_eq!(
        engine.decrypt_message(b"fresh", &before, b""),
        Err(MlsError::AuthenticationFailed)
    );
    assert_eq!(
        engine.decrypt_message_at_epoch(b"fresh", 0, &before, b""),
        Err(MlsError::EpochKeyMissing(0))
    );
}

#[test]
fn test_retention_window_bounds_history() {
    let config = MlsConfig {
        epoch_secret_retention: 2,
        ..MlsConfig::default()
    };
    let engine = engine_with_group(config, b"history").expect("engine");

    let mut payloads = Vec::new();
    for epoch in 0..4u64 {
        payloads.push(
            engine
                .encrypt_message(b"history", &epoch.to_le_bytes(), b"")
                .expect("encrypt"),
        );
        engine.update_group(b"history", b"").expect("update");
    }

    // Now at epoch 4; epochs 2 and 3 are retained.
    for epoch in 0..4u64 {
        let result =
            engine.decrypt_message_at_epoch(b"history", epoch, &payloads[epoch as usize], b"");
        if epoch >= 2 {
            assert_eq!(result.expect("retained"), epoch.to_le_bytes());
        } else {
            assert_eq!(result, Err(MlsError::EpochKeyMissing(epoch)));
        }
    }
}

#[test]
fn test_recreate_replaces_group() {
    let engine = engine_with_group(MlsConfig::default(), b"again").expect("engine");
    engine
        .add_member(b"again", &key_package().expect("kp"))
        .expect("add");
    engine
        .create_group(b"again", CipherSuite::default(), b"")
        .expect("recreate");
    let group = engine.group(b"again").expect("group");
    assert_eq!(group.epoch, 0);
    assert_eq!(group.member_count(), 0);
}

#[test]
fn test_summary_serializes() {
    let engine = engine_with_group(MlsConfig::default(), b"sum").expect("engine");
    let summary = engine.group_summary(b"sum").expect("summary");
    let json = serde_json::to_value(&summary).expect("json");
    assert_eq!(json["group_id"], hex::encode(b"sum"));
    assert_eq!(json["state"], "ACTIVE");
    assert_eq!(json["size_status"], "OPTIMAL");
    assert_eq!(json["epoch"], 0);
}
