use super::*;

#[test]
fn parses_init_index_command() {
    let cli = Cli::try_parse_from(["geoprop-cli", "init-index"]).expect("expected valid cli args");
    assert!(matches!(cli.command, Commands::InitIndex));
}

#[test]
fn parses_reindex_with_defaults() {
    let cli = Cli::try_parse_from(["geoprop-cli", "reindex", "props.json"])
        .expect("expected valid cli args");
    match cli.command {
        Commands::Reindex {
            file,
            batch_size,
            dry_run,
        } => {
            assert_eq!(file, std::path::PathBuf::from("props.json"));
            assert_eq!(batch_size, 500);
            assert!(!dry_run);
        }
        other => panic!("unexpected command: {other:?}"),
    }
}

#[test]
fn parses_geocode_with_country() {
    let cli = Cli::try_parse_from(["geoprop-cli", "geocode", "1 Rue de Rivoli", "--country", "FR"])
        .expect("expected valid cli args");
    assert!(matches!(
        cli.command,
        Commands::Geocode { ref address, country: Some(ref c) }
            if address == "1 Rue de Rivoli" && c == "FR"
    ));
}

#[test]
fn parses_negative_coordinates() {
    let cli = Cli::try_parse_from([
        "geoprop-cli",
        "distance",
        "48.8566",
        "2.3522",
        "51.5074",
        "-0.1278",
    ])
    .expect("expected valid cli args");
    assert!(matches!(
        cli.command,
        Commands::Distance { lon2, .. } if (lon2 + 0.1278).abs() < f64::EPSILON
    ));

    let cli = Cli::try_parse_from(["geoprop-cli", "reverse", "-33.86", "151.21"])
        .expect("expected valid cli args");
    assert!(matches!(cli.command, Commands::Reverse { lat, .. } if lat < 0.0));
}

#[test]
fn missing_command_is_an_error() {
    assert!(Cli::try_parse_from(["geoprop-cli"]).is_err());
}

#[test]
fn parse_documents_rejects_blank_ids_and_non_arrays() {
    let ok = r#"[{"id":"p1","ownerId":"o","status":"listed","type":"flat","price":1.0,
        "currency":"EUR","createdAt":"2024-01-01T00:00:00Z","updatedAt":"2024-01-01T00:00:00Z"}]"#;
    assert_eq!(index::parse_documents(ok).unwrap().len(), 1);

    let blank = ok.replace("\"p1\"", "\" \"");
    let err = index::parse_documents(&blank).unwrap_err();
    assert!(err.to_string().contains("position 0"));

    assert!(index::parse_documents("{}").is_err());
}

#[test]
fn distance_command_accepts_valid_points_only() {
    assert!(geocode::run_distance(48.8566, 2.3522, 51.5074, -0.1278).is_ok());
    assert!(geocode::run_distance(91.0, 0.0, 0.0, 0.0).is_err());
}
