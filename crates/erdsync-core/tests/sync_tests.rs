// Integration tests for sync and inference against a project on disk
use std::fs;

use erdsync_core::diagram::{Cardinality, Diagram, DraftedField, Entity, Relationship};
use erdsync_core::error::{Error, ErrorKind};
use erdsync_core::framework::{DbtProject, TransformFramework};
use erdsync_core::infer::RelationshipInferencer;
use erdsync_core::manifest::{Manifest, ManifestModel};
use erdsync_core::sync::{SyncReport, SyncStage, Synchronizer};
use erdsync_core::ProjectConfig;
use pretty_assertions::assert_eq;
use tempfile::TempDir;

fn setup_project() -> (TempDir, ProjectConfig) {
    let dir = tempfile::tempdir().unwrap();
    fs::create_dir_all(dir.path().join("models")).unwrap();
    let config = ProjectConfig::new(dir.path());
    (dir, config)
}

fn shop_manifest() -> Manifest {
    Manifest::from_models([
        ManifestModel::new("model.proj.customers", "customers", "models/customers.sql"),
        ManifestModel::new("model.proj.orders", "orders", "models/orders.sql"),
    ])
}

fn shop_diagram() -> Diagram {
    Diagram::new(
        vec![
            Entity::new("customers").with_model("model.proj.customers"),
            Entity::new("orders")
                .with_model("model.proj.orders")
                .with_field(DraftedField::new("customer_id").with_datatype("int")),
        ],
        vec![Relationship::new(
            "customers",
            "orders",
            Cardinality::OneToMany,
            "id",
            "customer_id",
        )],
    )
}

fn run_sync(config: &ProjectConfig, manifest: &Manifest, diagram: &Diagram) -> SyncReport {
    let report = Synchronizer::new(config, manifest, diagram).run().unwrap();
    assert!(report.is_success(), "Expected no errors: {:?}", report.errors);
    report
}

fn read(dir: &TempDir, relative: &str) -> String {
    fs::read_to_string(dir.path().join(relative)).unwrap()
}

fn write(dir: &TempDir, relative: &str, contents: &str) {
    let path = dir.path().join(relative);
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(path, contents).unwrap();
}

#[test]
fn test_end_to_end_customers_orders() {
    let (dir, config) = setup_project();
    let report = run_sync(&config, &shop_manifest(), &shop_diagram());

    assert_eq!(report.written.len(), 2);
    assert_eq!(
        read(&dir, "models/orders.yml"),
        "version: 2\n\
         models:\n  \
           - name: orders\n    \
             columns:\n      \
               - name: customer_id\n        \
                 data_type: int\n        \
                 data_tests:\n          \
                   - relationships:\n              \
                       arguments:\n                \
                         to: \"ref('customers')\"\n                \
                         field: id\n"
    );
    assert_eq!(
        read(&dir, "models/customers.yml"),
        "version: 2\nmodels:\n  - name: customers\n"
    );
}

#[test]
fn test_sync_is_idempotent() {
    let (dir, config) = setup_project();
    let manifest = shop_manifest();
    let diagram = shop_diagram();

    run_sync(&config, &manifest, &diagram);
    let orders = read(&dir, "models/orders.yml");
    let customers = read(&dir, "models/customers.yml");

    let second = run_sync(&config, &manifest, &diagram);
    assert!(second.written.is_empty(), "Unexpected writes: {:?}", second.written);
    assert_eq!(second.unchanged.len(), 2);
    assert_eq!(read(&dir, "models/orders.yml"), orders);
    assert_eq!(read(&dir, "models/customers.yml"), customers);
}

#[test]
fn test_hand_authored_file_survives_sync() {
    let (dir, config) = setup_project();
    let authored = r#"# Orders mart
version: 2

models:
  - name: orders  # fact table
    description: >
      One row per order.
    columns:
      - name: id
        data_tests:
          - unique

      # FK to customers
      - name: customer_id
        data_type: int
        data_tests:
          - not_null
          - relationships:
              arguments:
                to: ref('customers')
                field: id
              config:
                severity: warn
"#;
    write(&dir, "models/orders.yml", authored);

    let report = run_sync(&config, &shop_manifest(), &shop_diagram());
    assert_eq!(
        report.unchanged,
        vec![dir.path().join("models/orders.yml")]
    );
    assert_eq!(read(&dir, "models/orders.yml"), authored);
}

#[test]
fn test_rewrite_keeps_comments_and_severity() {
    let (dir, config) = setup_project();
    write(
        &dir,
        "models/orders.yml",
        "version: 2\nmodels:\n  - name: orders\n    columns:\n      # buyer\n      - name: customer_id\n        data_type: int\n        tests:\n          - relationships:\n              to: ref('clients')\n              field: client_id\n              config:\n                severity: warn\n",
    );

    run_sync(&config, &shop_manifest(), &shop_diagram());
    assert_eq!(
        read(&dir, "models/orders.yml"),
        "version: 2\nmodels:\n  - name: orders\n    columns:\n      # buyer\n      - name: customer_id\n        data_type: int\n        tests:\n          - relationships:\n              arguments:\n                to: \"ref('customers')\"\n                field: id\n              config:\n                severity: warn\n"
    );
}

#[test]
fn test_directionality_and_direction_change_cleanup() {
    let (dir, config) = setup_project();
    let manifest = Manifest::default();
    let entities = vec![Entity::new("teams"), Entity::new("games")];

    let diagram = Diagram::new(
        entities.clone(),
        vec![Relationship::new("teams", "games", Cardinality::OneToMany, "id", "team_id")],
    );
    run_sync(&config, &manifest, &diagram);
    assert_eq!(
        read(&dir, "models/games.yml"),
        "version: 2\nmodels:\n  - name: games\n    columns:\n      - name: team_id\n        data_type: text\n        data_tests:\n          - relationships:\n              arguments:\n                to: \"ref('teams')\"\n                field: id\n"
    );
    assert_eq!(read(&dir, "models/teams.yml"), "version: 2\nmodels:\n  - name: teams\n");

    let flipped = Diagram::new(
        entities,
        vec![Relationship::new("teams", "games", Cardinality::ManyToOne, "team_id", "id")],
    );
    run_sync(&config, &manifest, &flipped);
    assert_eq!(
        read(&dir, "models/games.yml"),
        "version: 2\nmodels:\n  - name: games\n    columns:\n      - name: team_id\n        data_type: text\n"
    );
    assert_eq!(
        read(&dir, "models/teams.yml"),
        "version: 2\nmodels:\n  - name: teams\n    columns:\n      - name: team_id\n        data_type: text\n        data_tests:\n          - relationships:\n              arguments:\n                to: \"ref('games')\"\n                field: id\n"
    );
}

#[test]
fn test_tests_on_models_outside_diagram_are_kept() {
    let (dir, config) = setup_project();
    let source = "version: 2\nmodels:\n  - name: orders\n    columns:\n      - name: store_id\n        data_tests:\n          - relationships:\n              arguments:\n                to: ref('stores')\n                field: id\n";
    write(&dir, "models/orders.yml", source);
    let diagram = Diagram::new(vec![Entity::new("orders")], Vec::new());

    let report = run_sync(&config, &Manifest::default(), &diagram);
    assert!(report.written.is_empty());
    assert_eq!(read(&dir, "models/orders.yml"), source);
}

#[test]
fn test_versioned_binding() {
    let (dir, config) = setup_project();
    let mut player = ManifestModel::new("model.project.player.v2", "player", "models/player.sql");
    player.version = Some(2);
    let manifest = Manifest::from_models([
        player,
        ManifestModel::new("model.project.game", "game", "models/game.sql"),
    ]);
    let diagram = Diagram::new(
        vec![
            Entity::new("players")
                .with_model("model.project.player.v2")
                .with_field(DraftedField::new("id").with_datatype("int")),
            Entity::new("games").with_model("model.project.game"),
        ],
        vec![Relationship::new("players", "games", Cardinality::OneToMany, "id", "player_id")],
    );

    run_sync(&config, &manifest, &diagram);
    assert_eq!(
        read(&dir, "models/player.yml"),
        "version: 2\nmodels:\n  - name: player\n    latest_version: 2\n    versions:\n      - v: 2\n        columns:\n          - name: id\n            data_type: int\n"
    );
    assert!(read(&dir, "models/game.yml").contains("to: \"ref('player', v=2)\""));

    let inferred = RelationshipInferencer::new(&config, &diagram).infer().unwrap();
    assert_eq!(
        inferred,
        vec![Relationship::new("players", "games", Cardinality::OneToMany, "id", "player_id")]
    );
}

#[test]
fn test_versioned_ref_resolves_by_name() {
    let (dir, config) = setup_project();
    write(
        &dir,
        "models/game.yml",
        "version: 2\nmodels:\n  - name: game\n    columns:\n      - name: player_id\n        data_tests:\n          - relationships:\n              arguments:\n                to: ref('player', v=1)\n                field: id\n",
    );
    let diagram = Diagram::new(
        vec![
            Entity::new("players").with_model("model.project.player.v2"),
            Entity::new("games").with_model("model.project.game"),
        ],
        Vec::new(),
    );

    let inferred = RelationshipInferencer::new(&config, &diagram).infer().unwrap();
    assert_eq!(
        inferred,
        vec![Relationship::new("players", "games", Cardinality::OneToMany, "id", "player_id")]
    );
}

#[test]
fn test_inference_dedup_and_order() {
    let (dir, config) = setup_project();
    let game = r#"version: 2
models:
  - name: game
    columns:
      - name: home_team_id
        data_tests:
          - relationships:
              arguments:
                to: ref('team')
                field: team_id
      - name: away_team_id
        tests:
          - relationships:
              to: ref('team')
              field: team_id
"#;
    write(&dir, "models/marts/game.yml", game);
    write(&dir, "models/staging/game_copy.yaml", game);
    write(&dir, "models/broken.yml", "models:\n  - name: [unclosed\n");

    let diagram = Diagram::new(
        vec![
            Entity::new("team").with_model("model.league.team"),
            Entity::new("game").with_model("model.league.game"),
        ],
        Vec::new(),
    );
    let inferred = RelationshipInferencer::new(&config, &diagram).infer().unwrap();
    assert_eq!(
        inferred,
        vec![
            Relationship::new("team", "game", Cardinality::OneToMany, "team_id", "away_team_id"),
            Relationship::new("team", "game", Cardinality::OneToMany, "team_id", "home_team_id"),
        ]
    );
}

#[test]
fn test_inference_ignores_unbound_entities() {
    let (dir, config) = setup_project();
    write(
        &dir,
        "models/game.yml",
        "version: 2\nmodels:\n  - name: game\n    columns:\n      - name: team_id\n        data_tests:\n          - relationships:\n              arguments:\n                to: ref('team')\n                field: id\n",
    );
    let diagram = Diagram::new(vec![Entity::new("team"), Entity::new("game")], Vec::new());

    let inferred = RelationshipInferencer::new(&config, &diagram).infer().unwrap();
    assert!(inferred.is_empty(), "Unexpected relationships: {:?}", inferred);

    let config = ProjectConfig {
        include_unbound: true,
        ..config
    };
    let inferred = RelationshipInferencer::new(&config, &diagram).infer().unwrap();
    assert_eq!(
        inferred,
        vec![Relationship::new("team", "game", Cardinality::OneToMany, "id", "team_id")]
    );
}

#[test]
fn test_failed_entity_does_not_block_others() {
    let (dir, config) = setup_project();
    let diagram = Diagram::new(
        vec![
            Entity::new("ghost").with_model("model.proj.ghost"),
            Entity::new("orders"),
        ],
        Vec::new(),
    );

    let report = Synchronizer::new(&config, &Manifest::default(), &diagram)
        .run()
        .unwrap();
    assert_eq!(report.written, vec![dir.path().join("models/orders.yml")]);
    assert_eq!(report.errors.len(), 1);
    assert_eq!(report.errors[0].entity_id, "ghost");
    assert_eq!(report.errors[0].stage, SyncStage::TargetFileSelected);
}

#[test]
fn test_malformed_target_file_is_reported() {
    let (dir, config) = setup_project();
    write(&dir, "models/orders.yml", "models: [\n");
    let diagram = Diagram::new(vec![Entity::new("orders"), Entity::new("customers")], Vec::new());

    let report = Synchronizer::new(&config, &Manifest::default(), &diagram)
        .run()
        .unwrap();
    assert_eq!(report.errors.len(), 1);
    assert_eq!(report.errors[0].stage, SyncStage::NodeEnsured);
    assert!(matches!(report.errors[0].error, Error::Parse { .. }));
    assert_eq!(report.written, vec![dir.path().join("models/customers.yml")]);
}

#[test]
fn test_write_failure_is_reported_at_written_stage() {
    let (dir, config) = setup_project();
    // The target's directory is taken by a regular file
    write(&dir, "models/marts", "not a directory");
    let manifest = Manifest::from_models([
        ManifestModel::new("model.proj.orders", "orders", "models/marts/orders.sql"),
        ManifestModel::new("model.proj.customers", "customers", "models/customers.sql"),
    ]);
    let diagram = Diagram::new(
        vec![
            Entity::new("orders").with_model("model.proj.orders"),
            Entity::new("customers").with_model("model.proj.customers"),
        ],
        Vec::new(),
    );

    let report = Synchronizer::new(&config, &manifest, &diagram).run().unwrap();
    assert_eq!(report.errors.len(), 1);
    assert_eq!(report.errors[0].entity_id, "orders");
    assert_eq!(report.errors[0].stage, SyncStage::Written);
    assert_eq!(report.errors[0].error.kind(), ErrorKind::FileOperation);
    assert_eq!(report.written, vec![dir.path().join("models/customers.yml")]);
}

#[test]
fn test_dot_prefixed_model_path() {
    let (dir, mut config) = setup_project();
    config.model_paths = vec!["./models".to_string()];

    let report = run_sync(&config, &shop_manifest(), &shop_diagram());
    assert_eq!(report.written.len(), 2);
    assert!(read(&dir, "models/orders.yml").contains("to: \"ref('customers')\""));

    let project = DbtProject::new(config, shop_manifest()).unwrap();
    assert_eq!(project.get_models().unwrap().len(), 2);
    assert!(project.get_model_schema("orders", None).unwrap().is_some());
}

#[test]
fn test_invalid_ids_fail_before_writing() {
    let (dir, config) = setup_project();
    let diagram = Diagram::new(vec![Entity::new("orders"), Entity::new("../escape")], Vec::new());

    let result = Synchronizer::new(&config, &Manifest::default(), &diagram).run();
    assert!(matches!(result, Err(Error::Validation { .. })));
    assert!(!dir.path().join("models/orders.yml").exists());
}

#[test]
fn test_framework_round_trip() {
    let (dir, config) = setup_project();
    let project = DbtProject::new(config, shop_manifest()).unwrap();
    let diagram = shop_diagram();

    let report = project.sync_relationships(&diagram).unwrap();
    assert_eq!(report.written.len(), 2);

    let inferred = project.infer_relationships(&diagram).unwrap();
    assert_eq!(inferred, diagram.relationships);

    let schema = project.get_model_schema("orders", None).unwrap().unwrap();
    assert_eq!(
        schema.get_column("customer_id").and_then(|c| c.data_type.as_deref()),
        Some("int")
    );
    assert!(dir.path().join("models/orders.yml").exists());
}

#[test]
fn test_entity_tags_and_description() {
    let (dir, config) = setup_project();
    let mut orders = Entity::new("orders");
    orders.description = "One row per order".to_string();
    orders.tags = vec!["finance".to_string()];
    let diagram = Diagram::new(vec![orders], Vec::new());

    run_sync(&config, &Manifest::default(), &diagram);
    assert_eq!(
        read(&dir, "models/orders.yml"),
        "version: 2\nmodels:\n  - name: orders\n    description: One row per order\n    config:\n      tags:\n        - finance\n"
    );
}
