//! Football Value-Bet CLI
//!
//! Match outcome, BTTS and over/under 2.5 predictions using a multi-task
//! neural network, with value-bet detection against market odds.

use clap::{Parser, Subcommand};
use footy::{Config, Result};

#[derive(Parser)]
#[command(name = "footy")]
#[command(about = "Football match prediction and value-bet detection using deep learning", long_about = None)]
struct Cli {
    /// Config file path
    #[arg(short, long, default_value = "config.toml")]
    config: String,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Data management commands
    Data {
        #[command(subcommand)]
        action: DataCommands,
    },
    /// Train the multi-task model on all finished fixtures
    Train {
        /// Override number of epochs
        #[arg(long)]
        epochs: Option<usize>,
    },
    /// Predict fixtures and flag value bets
    Predict {
        /// Fixture ids to analyze
        #[arg(required = true)]
        fixtures: Vec<i64>,
        /// Market odds file (JSON); placeholder odds are used otherwise
        #[arg(long)]
        odds: Option<String>,
        /// Output format
        #[arg(long, default_value = "table")]
        format: OutputFormat,
    },
    /// Model management commands
    Model {
        #[command(subcommand)]
        action: ModelCommands,
    },
    /// Initialize a new project with default config
    Init,
}

#[derive(Subcommand)]
enum DataCommands {
    /// Import teams and fixtures from an API-Football fixtures response
    ImportFixtures {
        /// JSON file
        file: String,
    },
    /// Import match statistics for one fixture from an API-Football response
    ImportStats {
        /// Fixture id
        fixture: i64,
        /// JSON file
        file: String,
    },
    /// Generate a synthetic league for experimentation
    Seed {
        /// Number of teams
        #[arg(long, default_value = "20")]
        teams: usize,
        /// Number of finished fixtures
        #[arg(long, default_value = "300")]
        fixtures: usize,
        /// Number of upcoming fixtures
        #[arg(long, default_value = "10")]
        upcoming: usize,
        /// Random seed
        #[arg(long, default_value = "42")]
        seed: u64,
    },
    /// Show database status
    Status,
}

#[derive(Subcommand)]
enum ModelCommands {
    /// Show model information
    Info,
}

#[derive(Clone, Debug)]
enum OutputFormat {
    Table,
    Json,
}

impl std::str::FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "table" => Ok(OutputFormat::Table),
            "json" => Ok(OutputFormat::Json),
            _ => Err(format!("Unknown format: {}. Use table or json.", s)),
        }
    }
}

fn main() {
    let cli = Cli::parse();

    // Initialize logging
    let log_level = if cli.verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(log_level))
        .format_timestamp(None)
        .init();

    // Load or create config
    let config = if std::path::Path::new(&cli.config).exists() {
        match Config::load(&cli.config) {
            Ok(c) => c,
            Err(e) => {
                eprintln!("Error loading config: {}", e);
                std::process::exit(1);
            }
        }
    } else {
        Config::default()
    };

    // Run command
    let result = match cli.command {
        Commands::Data { action } => match action {
            DataCommands::ImportFixtures { file } => commands::import_fixtures(&config, &file),
            DataCommands::ImportStats { fixture, file } => commands::import_stats(&config, fixture, &file),
            DataCommands::Seed {
                teams,
                fixtures,
                upcoming,
                seed,
            } => commands::seed(&config, teams, fixtures, upcoming, seed),
            DataCommands::Status => commands::data_status(&config),
        },
        Commands::Train { epochs } => commands::train(&config, epochs),
        Commands::Predict { fixtures, odds, format } => commands::predict(&config, fixtures, odds, format),
        Commands::Model { action } => match action {
            ModelCommands::Info => commands::model_info(&config),
        },
        Commands::Init => commands::init(&cli.config),
    };

    if let Err(e) = result {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

mod commands {
    use super::*;
    use footy::data::api_football;
    use footy::data::{Database, SyntheticLeague};
    use footy::model::ArtifactStore;
    use footy::predict::{
        analyze_fixtures, train_from_store, FixtureAnalysis, MarketOdds, ModelRegistry, ValueBetDetector,
    };
    use footy::training::TrainingPipeline;
    use footy::{FixtureId, FootyError, Market};

    pub fn init(config_path: &str) -> Result<()> {
        let config = Config::default();
        config.save(config_path)?;
        println!("Created default config at {}", config_path);

        // Create data directory
        std::fs::create_dir_all("data")?;
        std::fs::create_dir_all("model")?;
        println!("Created data/ and model/ directories");

        println!("\nNext steps:");
        println!("  1. Edit {} to customize settings", config_path);
        println!("  2. Run 'footy data import-fixtures <file>' or 'footy data seed' to load fixtures");
        println!("  3. Run 'footy train' to train the model");
        println!("  4. Run 'footy predict <FIXTURE_ID>...' to find value bets");

        Ok(())
    }

    pub fn import_fixtures(config: &Config, file: &str) -> Result<()> {
        let db = Database::open(&config.data.database_path)?;
        let json = std::fs::read_to_string(file)?;

        let imported = api_football::parse_fixtures(&json)?;
        for team in &imported.teams {
            db.upsert_team(team)?;
        }
        let count = db.upsert_fixtures(&imported.fixtures)?;

        println!("Stored {} fixtures ({} teams)", count, imported.teams.len());
        if imported.skipped > 0 {
            println!("Skipped {} malformed entries", imported.skipped);
        }

        Ok(())
    }

    pub fn import_stats(config: &Config, fixture_id: i64, file: &str) -> Result<()> {
        let db = Database::open(&config.data.database_path)?;
        let id = FixtureId(fixture_id);
        let fixture = db.get_fixture(id)?.ok_or(FootyError::FixtureNotFound(id))?;

        let json = std::fs::read_to_string(file)?;
        let stats = api_football::parse_statistics(&json, &fixture)?;
        db.upsert_statistics(&stats)?;

        println!("Stored statistics for fixture {}", fixture_id);
        Ok(())
    }

    pub fn seed(config: &Config, teams: usize, fixtures: usize, upcoming: usize, seed: u64) -> Result<()> {
        if teams < 2 {
            return Err(FootyError::Config("A league needs at least 2 teams".to_string()));
        }

        let db = Database::open(&config.data.database_path)?;
        let data = SyntheticLeague::new(teams, seed).with_upcoming(upcoming).generate(fixtures);

        for team in &data.teams {
            db.upsert_team(team)?;
        }
        let count = db.upsert_fixtures(&data.fixtures)?;
        for stats in &data.statistics {
            db.upsert_statistics(stats)?;
        }

        println!(
            "Seeded {} teams, {} fixtures ({} upcoming) and {} statistics records",
            data.teams.len(),
            count,
            upcoming,
            data.statistics.len()
        );
        Ok(())
    }

    pub fn data_status(config: &Config) -> Result<()> {
        let db = Database::open(&config.data.database_path)?;
        let stats = db.get_stats()?;

        println!("Database Status");
        println!("───────────────────────────────");
        println!("  Path:        {}", config.data.database_path);
        println!("  Teams:       {}", stats.team_count);
        println!("  Fixtures:    {}", stats.fixture_count);
        println!("  Finished:    {}", stats.finished_count);
        println!("  Statistics:  {}", stats.statistics_count);
        println!("  Predictions: {}", stats.prediction_count);
        if let (Some(earliest), Some(latest)) = (stats.earliest_kickoff, stats.latest_kickoff) {
            println!("  Range:       {} to {}", earliest.date(), latest.date());
        }

        Ok(())
    }

    pub fn train(config: &Config, epochs: Option<usize>) -> Result<()> {
        let mut training_config = config.clone();
        if let Some(e) = epochs {
            training_config.training.epochs = e;
        }

        println!("Initializing training...");

        let db = Database::open(&config.data.database_path)?;
        let stats = db.get_stats()?;
        if stats.finished_count == 0 {
            return Err(FootyError::Config(
                "No finished fixtures in database. Run 'footy data import-fixtures' first.".to_string(),
            ));
        }
        println!(
            "Loaded {} finished fixtures, {} statistics records",
            stats.finished_count, stats.statistics_count
        );

        let registry = ModelRegistry::new(ArtifactStore::new(&config.data.model_path));
        let pipeline = TrainingPipeline::new(training_config);
        let response = train_from_store(&db, &registry, &pipeline);

        if !response.success {
            return Err(FootyError::Model(response.message));
        }

        println!("\n{}", response.message);
        if let Some(report) = &response.report {
            println!("───────────────────────────────");
            println!(
                "  Split:       {} train / {} val / {} test",
                report.train_size, report.val_size, report.test_size
            );
            println!("  Skipped:     {}", report.skipped);
            println!("  Epochs:      {} (best {})", report.epochs_run, report.best_epoch);
            println!("  Val loss:    {:.4}", report.best_val_loss);
            println!("  Test loss:   {:.4}", report.test.avg_loss());
            println!("  1X2 acc:     {:.1}%", report.test.outcome_accuracy() * 100.0);
            println!("  BTTS acc:    {:.1}%", report.test.btts_accuracy() * 100.0);
            println!("  O/U 2.5 acc: {:.1}%", report.test.over_under_accuracy() * 100.0);
        }
        println!("\nModel saved to {}", config.data.model_path);

        Ok(())
    }

    pub fn predict(config: &Config, fixtures: Vec<i64>, odds: Option<String>, format: OutputFormat) -> Result<()> {
        let mut db = Database::open(&config.data.database_path)?;
        let registry = ModelRegistry::new(ArtifactStore::new(&config.data.model_path));
        registry.get_or_load()?;

        let market_odds = match odds.as_ref().or(config.value.odds_path.as_ref()) {
            Some(path) => MarketOdds::load(path)?,
            None => {
                log::info!("No odds file given, using placeholder odds");
                MarketOdds::placeholder()
            }
        };
        let detector = ValueBetDetector::new(config.value.margin);
        let ids: Vec<FixtureId> = fixtures.into_iter().map(FixtureId).collect();

        let response = analyze_fixtures(&mut db, &registry, &detector, &market_odds, &ids);
        if !response.success {
            return Err(FootyError::Model(response.message));
        }

        match format {
            OutputFormat::Table => {
                for result in &response.results {
                    print!("{}", format_analysis(result));
                }
                println!("{}", response.message);
            }
            OutputFormat::Json => {
                let json = serde_json::to_string_pretty(&response)
                    .map_err(|e| FootyError::Parse(format!("Failed to serialize response: {}", e)))?;
                println!("{}", json);
            }
        }

        Ok(())
    }

    fn format_analysis(result: &FixtureAnalysis) -> String {
        let mut output = String::new();
        output.push_str(&format!(
            "\n{} vs {}  ({}, {})\n",
            result.home_team,
            result.away_team,
            result.fixture_id.0,
            result.kickoff.format("%Y-%m-%d %H:%M")
        ));
        output.push_str("───────────────────────────────\n");

        for market in Market::ALL {
            let Some(selections) = result.predictions.get(market.name()) else {
                continue;
            };
            let line: Vec<String> = market
                .selections()
                .iter()
                .filter_map(|s| selections.get(s.name()).map(|p| format!("{} {:.1}%", s.name(), p * 100.0)))
                .collect();
            output.push_str(&format!("  {:<15} {}\n", market.name(), line.join("  ")));
        }

        if result.value_bets.is_empty() {
            output.push_str("  No value bets\n");
        } else {
            output.push_str("  Value bets:\n");
            for bet in &result.value_bets {
                output.push_str(&format!(
                    "    {} {}: odds {:.2} vs implied {:.2} (+{:.1}%)\n",
                    bet.market, bet.selection, bet.market_odds, bet.implied_odds, bet.value_pct
                ));
            }
        }
        if result.imputed {
            output.push_str("  (some features were imputed)\n");
        }

        output
    }

    pub fn model_info(config: &Config) -> Result<()> {
        let store = ArtifactStore::new(&config.data.model_path);
        let artifact = match store.read(&store.handle()) {
            Ok(artifact) => artifact,
            Err(FootyError::ArtifactNotFound(_)) => return Err(FootyError::ModelNotLoaded),
            Err(e) => return Err(e),
        };

        println!("Model Information");
        println!("───────────────────────────────");
        println!("  Path:           {}", config.data.model_path);
        println!("  Schema:         v{}", artifact.schema_version);
        println!("  Trained:        {}", artifact.created_at.format("%Y-%m-%d %H:%M"));
        println!("  Samples:        {}", artifact.sample_count);
        println!("  Features:       {}", artifact.feature_names.len());
        println!("  Hidden layers:  {:?}", artifact.model_config.hidden_dims);
        println!("  Dropout:        {}", artifact.model_config.dropout);
        println!("  Form window:    {}", artifact.feature_config.form_window);
        println!("  Weights:        {} bytes", artifact.weights.len());

        Ok(())
    }
}
