use clap::{Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

mod commands;

#[derive(Parser)]
#[command(name = "habitimer", version, about = "Habitimer CLI")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Habit catalog management
    Habit {
        #[command(subcommand)]
        action: commands::habit::HabitAction,
    },
    /// Timer control
    Timer {
        #[command(subcommand)]
        action: commands::timer::TimerAction,
    },
    /// Session log
    Sessions {
        #[command(subcommand)]
        action: commands::sessions::SessionsAction,
    },
    /// Configuration management
    Config {
        #[command(subcommand)]
        action: commands::config::ConfigAction,
    },
    /// Show a live countdown for the running habit
    Watch(commands::watch::WatchArgs),
    /// Serve the HTTP API
    Serve(commands::serve::ServeArgs),
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("habitimer=info,habitimer_core=info,tower_http=info"));
    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

fn main() {
    init_tracing();

    let cli = Cli::parse();
    let result = match cli.command {
        Commands::Habit { action } => commands::habit::run(action),
        Commands::Timer { action } => commands::timer::run(action),
        Commands::Sessions { action } => commands::sessions::run(action),
        Commands::Config { action } => commands::config::run(action),
        Commands::Watch(args) => commands::watch::run(args),
        Commands::Serve(args) => commands::serve::run(args),
    };

    if let Err(e) = result {
        eprintln!("error: {e}");
        std::process::exit(1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn parses_timer_stop_with_habit() {
        let cli = Cli::try_parse_from(["habitimer", "timer", "stop", "--habit-id", "4"]).unwrap();
        match cli.command {
            Commands::Timer {
                action: commands::timer::TimerAction::Stop { habit_id },
            } => assert_eq!(habit_id, Some(4)),
            _ => panic!("expected timer stop"),
        }
    }

    #[test]
    fn parses_watch_remote() {
        let cli =
            Cli::try_parse_from(["habitimer", "watch", "--remote", "http://10.0.0.2:3000", "--once"])
                .unwrap();
        match cli.command {
            Commands::Watch(args) => {
                assert_eq!(args.remote.as_deref(), Some("http://10.0.0.2:3000"));
                assert!(args.once);
            }
            _ => panic!("expected watch"),
        }
    }

    #[test]
    fn sessions_today_help_describes_end_time_filter() {
        let mut cmd = Cli::command();
        let today = cmd
            .find_subcommand_mut("sessions")
            .and_then(|s| s.find_subcommand_mut("today"))
            .unwrap();
        let help = today.render_help().to_string();
        assert!(help.contains("ended since local midnight"), "{help}");
    }

    #[test]
    fn habit_add_requires_name() {
        assert!(Cli::try_parse_from(["habitimer", "habit", "add"]).is_err());
    }

    #[test]
    fn start_rejects_non_numeric_id() {
        assert!(Cli::try_parse_from(["habitimer", "timer", "start", "reading"]).is_err());
    }
}
