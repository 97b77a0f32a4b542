use super::*;

#[test]
fn parses_migrate_command() {
    let cli = Cli::try_parse_from(["boothdb-cli", "migrate"]).expect("expected valid cli args");
    assert!(matches!(cli.command, Some(Commands::Migrate)));
}

#[test]
fn parses_seed_command() {
    let cli = Cli::try_parse_from(["boothdb-cli", "seed"]).expect("expected valid cli args");
    assert!(matches!(cli.command, Some(Commands::Seed)));
}

#[test]
fn parses_sources_command() {
    let cli = Cli::try_parse_from(["boothdb-cli", "sources"]).expect("expected valid cli args");
    assert!(matches!(cli.command, Some(Commands::Sources)));
}

#[test]
fn no_command_is_none() {
    let cli = Cli::try_parse_from(["boothdb-cli"]).expect("expected valid cli args");
    assert!(cli.command.is_none());
}

#[test]
fn test_crawl_defaults_to_all_sources() {
    let cli = Cli::try_parse_from(["boothdb-cli", "crawl"]).unwrap();
    assert!(matches!(
        cli.command,
        Some(Commands::Crawl {
            source: None,
            content: None,
            offline: false,
            dry_run: false,
            concurrency: 2,
        })
    ));
}

#[test]
fn test_crawl_single_source_with_content() {
    let cli = Cli::try_parse_from([
        "boothdb-cli",
        "crawl",
        "--source",
        "photobooth-net",
        "--content",
        "page.html",
        "--offline",
        "--dry-run",
        "--concurrency",
        "4",
    ])
    .unwrap();

    match cli.command {
        Some(Commands::Crawl {
            source,
            content,
            offline,
            dry_run,
            concurrency,
        }) => {
            assert_eq!(source.as_deref(), Some("photobooth-net"));
            assert_eq!(content, Some(PathBuf::from("page.html")));
            assert!(offline);
            assert!(dry_run);
            assert_eq!(concurrency, 4);
        }
        other => panic!("unexpected command: {other:?}"),
    }
}

#[test]
fn test_crawl_content_requires_source() {
    let result = Cli::try_parse_from(["boothdb-cli", "crawl", "--content", "page.html"]);
    assert!(result.is_err());
}

#[test]
fn test_dedup_requires_input() {
    assert!(Cli::try_parse_from(["boothdb-cli", "dedup"]).is_err());

    let cli = Cli::try_parse_from([
        "boothdb-cli",
        "dedup",
        "--input",
        "booths.json",
        "--no-geocode",
    ])
    .unwrap();
    assert!(matches!(
        cli.command,
        Some(Commands::Dedup {
            output: None,
            no_geocode: true,
            ..
        })
    ));
}

#[test]
fn test_geocode_with_context_flags() {
    let cli = Cli::try_parse_from([
        "boothdb-cli",
        "geocode",
        "20 W 29th St",
        "--name",
        "Ace Hotel",
        "--city",
        "New York",
        "--country",
        "US",
    ])
    .unwrap();

    match cli.command {
        Some(Commands::Geocode {
            address,
            name,
            city,
            country,
        }) => {
            assert_eq!(address, "20 W 29th St");
            assert_eq!(name.as_deref(), Some("Ace Hotel"));
            assert_eq!(city.as_deref(), Some("New York"));
            assert_eq!(country.as_deref(), Some("US"));
        }
        other => panic!("unexpected command: {other:?}"),
    }
}
