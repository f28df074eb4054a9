//! Integration tests for tuning profiles and engine configuration.
//! Tests: preset parsing, JSON profiles, atomic reconfigure, snapshots

use scriptsync_core::{
    Aggressiveness, BatchOutcome, EngineConfig, Script, Smoothness, StaticLayout, SyncEngine,
    SyncError, TranscriptEvent, TuningProfile,
};

#[test]
fn presets_parse_from_host_strings() {
    for preset in Aggressiveness::ALL {
        assert_eq!(preset.to_string().parse::<Aggressiveness>().unwrap(), preset);
    }
    for preset in Smoothness::ALL {
        assert_eq!(preset.to_string().parse::<Smoothness>().unwrap(), preset);
    }
    assert!(matches!(
        "reckless".parse::<Aggressiveness>(),
        Err(SyncError::UnknownPreset { kind: "aggressiveness", .. })
    ));
}

#[test]
fn host_profile_json_is_applied_whole() {
    let mut engine = SyncEngine::new(StaticLayout::default(), EngineConfig::default()).unwrap();
    let profile = TuningProfile::from_json_str(
        r#"{
            "marker_percent": 0.3,
            "aggressiveness": "aggressive-live",
            "smoothness": "responsive",
            "hybrid_lock": true,
            "pid": {"kp": 0.001, "kd": 0.0001, "max_bias_pct": 0.1, "conf_min": 0.5, "decay_ms": 400}
        }"#,
    )
    .unwrap();
    engine.reconfigure(profile).unwrap();
    assert_eq!(*engine.profile(), profile);
    assert_eq!(engine.profile().matching().window_ahead, 450);
    assert_eq!(engine.profile().motion().stable_hits, 1);
}

#[test]
fn invalid_profiles_are_rejected_without_partial_updates() {
    let mut engine = SyncEngine::new(StaticLayout::default(), EngineConfig::default()).unwrap();
    let original = *engine.profile();

    let mut profile = TuningProfile::builder()
        .aggressiveness(Aggressiveness::Conservative)
        .build()
        .unwrap();
    profile.pid.decay_ms = 0.0;
    let err = engine.reconfigure(profile).unwrap_err();
    assert!(matches!(err, SyncError::InvalidTuning { field: "pid.decay_ms", .. }));
    assert_eq!(*engine.profile(), original);

    assert!(TuningProfile::from_json_str(r#"{"smoothness": "jittery"}"#).is_err());
}

#[test]
fn invalid_engine_config_is_refused() {
    let config = EngineConfig {
        forced_commit_ticks: 0,
        ..EngineConfig::default()
    };
    let err = SyncEngine::new(StaticLayout::default(), config).err().unwrap();
    assert!(matches!(err, SyncError::InvalidConfig { .. }));

    let json = EngineConfig::default().to_json_string().unwrap();
    assert_eq!(EngineConfig::from_json_str(&json).unwrap(), EngineConfig::default());
}

#[test]
fn conservative_profile_clamps_weak_long_jumps() {
    let script = Script::from_text(
        "alpha bravo charlie delta echo foxtrot golf hotel india juliet kilo lima mike \
         november oscar papa quebec romeo sierra tango uniform victor whiskey xray yankee zulu",
    );
    let profile = TuningProfile::builder()
        .aggressiveness(Aggressiveness::Conservative)
        .build()
        .unwrap();
    let mut engine =
        SyncEngine::with_profile(StaticLayout::default(), EngineConfig::default(), profile).unwrap();
    engine.load_script(&script, 0).unwrap();

    // A misheard tail keeps similarity under the strict-forward bar.
    let outcome = engine.handle_transcript(
        &TranscriptEvent::final_text("sierra tango uniform victor whiskey pickle"),
        100,
    );
    // Scores about 0.81 at word 23, under the conservative 0.82 bar.
    assert!(
        matches!(outcome, BatchOutcome::Committed { from: 0, to: 12, .. }),
        "{outcome:?}"
    );
}

#[test]
fn snapshot_reports_script_and_state() {
    let mut engine = SyncEngine::new(StaticLayout::default(), EngineConfig::default()).unwrap();
    assert!(engine.snapshot(0).script.is_none());
    let summary = engine
        .load_script(&Script::from_text("one two three four five six\nseven eight nine ten"), 0)
        .unwrap();
    assert_eq!(summary.tokens, 10);
    assert_eq!(summary.lines, 2);
    assert!(!summary.reused);

    engine.handle_transcript(&TranscriptEvent::final_text("two three four"), 100);
    let snapshot = engine.snapshot(100);
    assert_eq!(snapshot.engine_id, engine.id());
    assert_eq!(snapshot.alignment.committed_index, 3);
    assert_eq!(snapshot.script.as_ref().map(|s| s.fingerprint.clone()), Some(summary.fingerprint));

    let json = snapshot.to_json_string().unwrap();
    let value: serde_json::Value = serde_json::from_str(&json).unwrap();
    assert_eq!(value["alignment"]["committed_index"], 3);
    assert_eq!(value["profile"]["smoothness"], "balanced");
}
