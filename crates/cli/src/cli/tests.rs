use super::{Commands, ResolvedCli, TransitionArg};
use crate::config::{AppConfig, confique_app_config_layer::AppConfigLayer};
use crate::keys;
use ballot_core::{Engine, Event, Phase, Snapshot};
use confique::{Config, Layer};
use std::path::{Path, PathBuf};
use tempfile::tempdir;

/// Test helper that builds a configuration pointing at a temporary store
fn test_config(temp_path: &Path) -> AppConfig {
    let mut layer_config = AppConfigLayer::default_values();
    layer_config.store.path = Some(temp_path.join("ballot.cbor"));

    AppConfig::builder()
        .preloaded(layer_config)
        .load()
        .expect("Failed to load test config")
        .with_resolved_paths()
        .expect("Failed to resolve paths in test config")
}

async fn run(config: &AppConfig, command: Commands) -> anyhow::Result<()> {
    ResolvedCli::new(command, config.clone()).handle_command().await
}

fn load_engine(config: &AppConfig) -> Engine {
    Engine::restore(Snapshot::load(&config.store.path).unwrap()).unwrap()
}

fn key_path(dir: &Path, name: &str) -> PathBuf {
    dir.join(format!("{name}.key"))
}

#[tokio::test]
async fn full_session_through_the_cli() {
    let temp_dir = tempdir().unwrap();
    let temp_path = temp_dir.path();
    let config = test_config(temp_path);

    let admin_key = key_path(temp_path, "admin");
    let voter_key = key_path(temp_path, "voter");
    run(&config, Commands::Keygen { out: admin_key.clone() }).await.unwrap();
    run(&config, Commands::Keygen { out: voter_key.clone() }).await.unwrap();
    let voter = keys::identity(&keys::load(&voter_key).unwrap());

    run(&config, Commands::Init { key: admin_key.clone(), force: false })
        .await
        .unwrap();
    run(
        &config,
        Commands::Register {
            key: admin_key.clone(),
            identity: voter.to_string(),
        },
    )
    .await
    .unwrap();
    run(
        &config,
        Commands::Advance {
            key: admin_key.clone(),
            transition: TransitionArg::StartProposals,
        },
    )
    .await
    .unwrap();
    run(
        &config,
        Commands::Propose {
            key: voter_key.clone(),
            description: "Repaint the hall".into(),
        },
    )
    .await
    .unwrap();
    for transition in [TransitionArg::EndProposals, TransitionArg::StartVoting] {
        run(&config, Commands::Advance { key: admin_key.clone(), transition })
            .await
            .unwrap();
    }
    run(&config, Commands::Vote { key: voter_key.clone(), proposal: 1 })
        .await
        .unwrap();
    run(
        &config,
        Commands::Advance {
            key: admin_key.clone(),
            transition: TransitionArg::EndVoting,
        },
    )
    .await
    .unwrap();
    run(&config, Commands::Tally { key: admin_key.clone() }).await.unwrap();
    run(&config, Commands::Verify).await.unwrap();

    let engine = load_engine(&config);
    assert_eq!(engine.ballot().phase(), Phase::VotesTallied);
    assert_eq!(engine.ballot().winning_proposal_id(), 1);
    assert_eq!(engine.history().len(), 8);
    assert_eq!(
        engine.history()[5].event,
        Event::Voted {
            voter,
            proposal_id: 1
        }
    );
}

#[tokio::test]
async fn rejected_command_does_not_touch_the_store() {
    let temp_dir = tempdir().unwrap();
    let temp_path = temp_dir.path();
    let config = test_config(temp_path);

    let admin_key = key_path(temp_path, "admin");
    let other_key = key_path(temp_path, "other");
    run(&config, Commands::Keygen { out: admin_key.clone() }).await.unwrap();
    run(&config, Commands::Keygen { out: other_key.clone() }).await.unwrap();
    run(&config, Commands::Init { key: admin_key, force: false })
        .await
        .unwrap();
    let before = std::fs::read(&config.store.path).unwrap();

    let result = run(
        &config,
        Commands::Advance {
            key: other_key,
            transition: TransitionArg::StartProposals,
        },
    )
    .await;

    assert!(result.is_err());
    assert_eq!(std::fs::read(&config.store.path).unwrap(), before);
}

#[tokio::test]
async fn init_refuses_to_overwrite() {
    let temp_dir = tempdir().unwrap();
    let temp_path = temp_dir.path();
    let config = test_config(temp_path);

    let admin_key = key_path(temp_path, "admin");
    run(&config, Commands::Keygen { out: admin_key.clone() }).await.unwrap();
    run(&config, Commands::Init { key: admin_key.clone(), force: false })
        .await
        .unwrap();

    assert!(
        run(&config, Commands::Init { key: admin_key.clone(), force: false })
            .await
            .is_err()
    );
    run(&config, Commands::Init { key: admin_key, force: true })
        .await
        .unwrap();
}

#[tokio::test]
async fn commands_need_an_initialized_store() {
    let temp_dir = tempdir().unwrap();
    let config = test_config(temp_dir.path());

    assert!(run(&config, Commands::Status { json: false }).await.is_err());
    assert!(run(&config, Commands::Verify).await.is_err());
}

#[tokio::test]
async fn verify_fails_on_edited_store() {
    let temp_dir = tempdir().unwrap();
    let temp_path = temp_dir.path();
    let config = test_config(temp_path);

    let admin_key = key_path(temp_path, "admin");
    run(&config, Commands::Keygen { out: admin_key.clone() }).await.unwrap();
    run(&config, Commands::Init { key: admin_key.clone(), force: false })
        .await
        .unwrap();
    run(
        &config,
        Commands::Register {
            key: admin_key,
            identity: "0x00000000000000000000000000000000000000b1".into(),
        },
    )
    .await
    .unwrap();

    let mut snapshot = Snapshot::load(&config.store.path).unwrap();
    snapshot.history.clear();
    snapshot.save(&config.store.path).unwrap();

    assert!(run(&config, Commands::Verify).await.is_err());
}

#[tokio::test]
async fn concurrent_submitters_keep_every_commit() {
    let temp_dir = tempdir().unwrap();
    let temp_path = temp_dir.path();
    let config = test_config(temp_path);

    let admin_key = key_path(temp_path, "admin");
    run(&config, Commands::Keygen { out: admin_key.clone() }).await.unwrap();
    run(&config, Commands::Init { key: admin_key.clone(), force: false })
        .await
        .unwrap();

    let identities: Vec<String> = (0..8)
        .map(|i| format!("0x00000000000000000000000000000000000000c{i}"))
        .collect();
    let handles: Vec<_> = identities
        .iter()
        .map(|identity| {
            let cli = ResolvedCli::new(
                Commands::Register {
                    key: admin_key.clone(),
                    identity: identity.clone(),
                },
                config.clone(),
            );
            tokio::spawn(async move { cli.handle_command().await })
        })
        .collect();
    for handle in handles {
        handle.await.unwrap().unwrap();
    }

    let engine = load_engine(&config);
    assert_eq!(engine.history().len(), identities.len());
    for identity in &identities {
        assert!(engine.ballot().voters().is_registered(&identity.as_str().into()));
    }
}

#[tokio::test]
async fn events_since_skips_earlier_records() {
    let temp_dir = tempdir().unwrap();
    let temp_path = temp_dir.path();
    let config = test_config(temp_path);

    let admin_key = key_path(temp_path, "admin");
    run(&config, Commands::Keygen { out: admin_key.clone() }).await.unwrap();
    run(&config, Commands::Init { key: admin_key.clone(), force: false })
        .await
        .unwrap();
    run(
        &config,
        Commands::Advance {
            key: admin_key,
            transition: TransitionArg::StartProposals,
        },
    )
    .await
    .unwrap();

    run(&config, Commands::Events { since: 0, json: true }).await.unwrap();
    run(&config, Commands::Events { since: 5, json: false }).await.unwrap();
    assert_eq!(load_engine(&config).log().since(1).len(), 0);
}
