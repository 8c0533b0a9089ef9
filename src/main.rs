use anyhow::{Context, anyhow};
use bracket_api::client::BracketApi;
use bracket_api::{BracketService, MatchStatus, Slot};
use bracket_desk::draw::render_draft;
use bracket_desk::state::app_settings::AppSettings;
use bracket_desk::state::bus::InvalidationBus;
use bracket_desk::state::cache::FileCache;
use bracket_desk::state::desk::BracketDesk;
use bracket_desk::state::editor::FixtureOutcome;
use bracket_desk::state::error::BracketError;
use bracket_desk::state::progression::{Advance, MatchScore};
use bracket_desk::state::reconcile::{LoadedDraft, ReconcileWorker};
use bracket_desk::state::refresher::PeriodicRefresher;
use chrono::{DateTime, Utc};
use log::{debug, error};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::time::Duration;

type Desk = BracketDesk<BracketApi, FileCache>;

const WATCH_REFRESH: Duration = Duration::from_secs(30);

#[derive(Debug, Clone, PartialEq)]
enum Cli {
    Help,
    Version,
    Run { tournament_id: String, command: Command },
}

#[derive(Debug, Clone, PartialEq)]
enum SlotTarget {
    Team(String),
    Winner { round: u32, position: u32 },
    Bye,
}

#[derive(Debug, Clone, PartialEq)]
enum Command {
    Show,
    Watch,
    Generate,
    Slot { round: u32, position: u32, slot_index: usize, target: SlotTarget },
    Schedule { round: u32, position: u32, venue: Option<String>, at: Option<DateTime<Utc>> },
    Save,
    Commit,
    Finalize,
    Activate { round: u32 },
    Status { round: u32, position: u32, status: MatchStatus },
    Result { round: u32, position: u32, score: MatchScore },
    Reset,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args: Vec<String> = std::env::args().skip(1).collect();
    let (tournament_id, command) = match parse_args(&args) {
        Ok(Cli::Help) => {
            println!("{}", usage_text());
            return Ok(());
        }
        Ok(Cli::Version) => {
            println!("bracket-desk {}", env!("CARGO_PKG_VERSION"));
            return Ok(());
        }
        Ok(Cli::Run { tournament_id, command }) => (tournament_id, command),
        Err(message) => {
            eprintln!("{message}\n\n{}", usage_text());
            std::process::exit(2);
        }
    };

    better_panic::install();
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();

    let settings = AppSettings::load();
    debug!("settings: {settings:?}");

    let desk = Arc::new(BracketDesk::new(
        BracketApi::new(&settings.api_url).with_timeout(settings.api_timeout),
        FileCache::new(&settings.cache_dir),
        InvalidationBus::default(),
    ));

    if let Err(e) = run(desk, &tournament_id, command).await {
        error!("{tournament_id}: {e:#}");
        eprintln!("error: {e:#}");
        if let Some(bracket_error) = e.downcast_ref::<BracketError>() {
            eprintln!("hint: {}", bracket_error.remedy());
        }
        std::process::exit(1);
    }
    Ok(())
}

async fn run(desk: Arc<Desk>, tournament_id: &str, command: Command) -> anyhow::Result<()> {
    if command == Command::Watch {
        return watch(desk, tournament_id).await;
    }

    let loaded = desk.load(tournament_id).await;
    if let Some(warning) = &loaded.warning {
        eprintln!("warning: {warning}");
    }

    let outcome = execute(&desk, tournament_id, command).await;
    let edited = match &outcome {
        Ok(edited) => *edited,
        Err(e) => e.downcast_ref::<BracketError>().is_some_and(|e| !e.nothing_changed()),
    };
    // Uncommitted edits only live in this process until they are cached.
    if edited && !desk.draft(tournament_id).await.flags().committed() {
        desk.save_temporarily(tournament_id).await?;
    }
    outcome?;

    print!("{}", render_draft(&desk.draft(tournament_id).await));
    Ok(())
}

/// Returns whether the draft was edited.
async fn execute(desk: &Desk, tournament_id: &str, command: Command) -> anyhow::Result<bool> {
    match command {
        Command::Show | Command::Watch => Ok(false),
        Command::Generate => {
            desk.generate_by_id(tournament_id).await?;
            Ok(true)
        }
        Command::Slot { round, position, slot_index, target } => {
            let slot = match target {
                SlotTarget::Bye => Slot::Bye,
                SlotTarget::Winner { round, position } => Slot::winner_of(round, position),
                SlotTarget::Team(team_id) => {
                    let tournament = desk.service().fetch_tournament(tournament_id).await?;
                    let team = tournament
                        .find_team(&team_id)
                        .ok_or_else(|| anyhow!("team {team_id} is not entered in {tournament_id}"))?;
                    Slot::Team(team.clone())
                }
            };
            desk.set_slot(tournament_id, round, position, slot_index, slot).await?;
            Ok(true)
        }
        Command::Schedule { round, position, venue, at } => {
            desk.set_schedule(tournament_id, round, position, venue, at).await?;
            Ok(true)
        }
        Command::Save => {
            let saved_at = desk.save_temporarily(tournament_id).await?;
            println!("saved locally at {}", saved_at.format("%Y-%m-%d %H:%M:%S"));
            Ok(false)
        }
        Command::Commit => {
            let summary = desk.commit(tournament_id).await?;
            println!(
                "committed: {} created, {} updated",
                summary.created_count, summary.updated_count
            );
            Ok(false)
        }
        Command::Finalize => {
            match desk.create_final_fixtures(tournament_id).await? {
                FixtureOutcome::Created(count) => println!("created {count} fixture(s)"),
                FixtureOutcome::AlreadyCreated => println!("fixtures already exist"),
            }
            Ok(false)
        }
        Command::Activate { round } => {
            desk.activate_round(tournament_id, round).await?;
            Ok(true)
        }
        Command::Status { round, position, status } => {
            desk.set_match_status(tournament_id, round, position, status).await?;
            Ok(true)
        }
        Command::Result { round, position, score } => {
            for advance in desk.record_result(tournament_id, round, position, score).await? {
                println!("{}", describe_advance(&advance));
            }
            Ok(true)
        }
        Command::Reset => {
            desk.reset(tournament_id).await?;
            println!("bracket reset; generate a new one to continue");
            Ok(false)
        }
    }
}

fn describe_advance(advance: &Advance) -> String {
    match advance {
        Advance::Placed { team, round, position, slot } => format!(
            "{} moves to round {round} match {} ({})",
            team.name,
            position + 1,
            if *slot == 0 { "first slot" } else { "second slot" }
        ),
        Advance::Walkover { team, round, position } => {
            format!("{} walks over in round {round} match {}", team.name, position + 1)
        }
        Advance::Champion(team) => format!("{} wins the tournament", team.name),
    }
}

async fn watch(desk: Arc<Desk>, tournament_id: &str) -> anyhow::Result<()> {
    let (views_tx, mut views) = mpsc::channel::<LoadedDraft>(16);
    let worker = tokio::spawn(ReconcileWorker::new(desk.clone(), tournament_id, views_tx).run());
    let refresher =
        tokio::spawn(PeriodicRefresher::new(desk.bus().clone(), tournament_id, WATCH_REFRESH).run());

    let mut last_shown = None;
    loop {
        tokio::select! {
            Some(loaded) = views.recv() => {
                if let Some(warning) = &loaded.warning {
                    eprintln!("warning: {warning}");
                }
                if last_shown.as_ref() != Some(&loaded.draft) {
                    println!("{}", render_draft(&loaded.draft));
                    last_shown = Some(loaded.draft);
                }
            }
            signal = tokio::signal::ctrl_c() => {
                signal.context("waiting for Ctrl-C")?;
                break;
            }
        }
    }

    worker.abort();
    refresher.abort();
    Ok(())
}

fn parse_args(args: &[String]) -> Result<Cli, String> {
    let mut args = args.iter().map(String::as_str);
    let tournament_id = match args.next() {
        None | Some("-h" | "--help") => return Ok(Cli::Help),
        Some("-V" | "--version") => return Ok(Cli::Version),
        Some(flag) if flag.starts_with('-') => return Err(format!("Unknown argument: {flag}")),
        Some(id) => id.to_string(),
    };
    let rest: Vec<&str> = args.collect();
    let Some((&name, params)) = rest.split_first() else {
        return Ok(Cli::Run { tournament_id, command: Command::Show });
    };

    let command = match (name, params) {
        ("show", []) => Command::Show,
        ("watch", []) => Command::Watch,
        ("generate", []) => Command::Generate,
        ("save", []) => Command::Save,
        ("commit", []) => Command::Commit,
        ("finalize", []) => Command::Finalize,
        ("reset", ["--yes"]) => Command::Reset,
        ("reset", []) => {
            return Err("reset throws the bracket away everywhere; run it again with --yes".into());
        }
        ("activate", [round]) => Command::Activate { round: number(round, "round")? },
        ("slot", [round, match_no, side, target]) => Command::Slot {
            round: number(round, "round")?,
            position: match_position(match_no)?,
            slot_index: match *side {
                "a" | "1" => 0,
                "b" | "2" => 1,
                other => return Err(format!("slot side must be a or b, got '{other}'")),
            },
            target: slot_target(target)?,
        },
        ("schedule", [round, match_no, options @ ..]) => {
            let (venue, at) = schedule_options(options)?;
            Command::Schedule {
                round: number(round, "round")?,
                position: match_position(match_no)?,
                venue,
                at,
            }
        }
        ("status", [round, match_no, status]) => Command::Status {
            round: number(round, "round")?,
            position: match_position(match_no)?,
            status: match *status {
                "live" => MatchStatus::Live,
                "scheduled" => MatchStatus::Scheduled,
                "postponed" => MatchStatus::Postponed,
                "cancelled" => MatchStatus::Cancelled,
                other => return Err(format!("unknown match status '{other}'")),
            },
        },
        ("result", [round, match_no, score_a, score_b, tiebreak @ ..]) => {
            let mut score = MatchScore::new(number(score_a, "score")?, number(score_b, "score")?);
            match tiebreak {
                [] => {}
                [a, b] => score = score.with_tiebreak(number(a, "tiebreak")?, number(b, "tiebreak")?),
                _ => return Err("a tiebreak needs two numbers".into()),
            }
            Command::Result {
                round: number(round, "round")?,
                position: match_position(match_no)?,
                score,
            }
        }
        (other, _) => return Err(format!("Unknown or incomplete command: {other}")),
    };
    Ok(Cli::Run { tournament_id, command })
}

fn number(raw: &str, what: &str) -> Result<u32, String> {
    raw.parse().map_err(|_| format!("{what} must be a whole number, got '{raw}'"))
}

// Matches are numbered from 1 on the command line.
fn match_position(raw: &str) -> Result<u32, String> {
    match number(raw, "match")? {
        0 => Err("matches are numbered from 1".into()),
        n => Ok(n - 1),
    }
}

fn slot_target(raw: &str) -> Result<SlotTarget, String> {
    if raw == "bye" {
        return Ok(SlotTarget::Bye);
    }
    if let Some(source) = raw.strip_prefix("winner:") {
        let Some((round, match_no)) = source.split_once(':') else {
            return Err(format!("expected winner:<round>:<match>, got '{raw}'"));
        };
        return Ok(SlotTarget::Winner {
            round: number(round, "round")?,
            position: match_position(match_no)?,
        });
    }
    Ok(SlotTarget::Team(raw.to_string()))
}

fn schedule_options(options: &[&str]) -> Result<(Option<String>, Option<DateTime<Utc>>), String> {
    let (mut venue, mut at) = (None, None);
    let mut options = options.iter();
    while let Some(&option) = options.next() {
        let Some(&value) = options.next() else {
            return Err(format!("{option} needs a value"));
        };
        match option {
            "--venue" => venue = Some(value.to_string()),
            "--at" => {
                let parsed = DateTime::parse_from_rfc3339(value)
                    .map_err(|e| format!("--at expects an RFC 3339 time ({e})"))?;
                at = Some(parsed.with_timezone(&Utc));
            }
            other => return Err(format!("Unknown schedule option: {other}")),
        }
    }
    if venue.is_none() && at.is_none() {
        return Err("schedule needs --venue and/or --at".into());
    }
    Ok((venue, at))
}

fn usage_text() -> &'static str {
    "bracket-desk - single-elimination bracket lifecycle

Usage:
  bracket-desk <tournament-id> [show]
  bracket-desk <tournament-id> watch
  bracket-desk <tournament-id> generate
  bracket-desk <tournament-id> slot <round> <match> <a|b> <team-id|bye|winner:<round>:<match>>
  bracket-desk <tournament-id> schedule <round> <match> [--venue <name>] [--at <rfc3339>]
  bracket-desk <tournament-id> save
  bracket-desk <tournament-id> commit
  bracket-desk <tournament-id> finalize
  bracket-desk <tournament-id> activate <round>
  bracket-desk <tournament-id> status <round> <match> <live|scheduled|postponed|cancelled>
  bracket-desk <tournament-id> result <round> <match> <score-a> <score-b> [<tiebreak-a> <tiebreak-b>]
  bracket-desk <tournament-id> reset --yes
  bracket-desk --help
  bracket-desk --version

Environment:
  BRACKET_API_URL            Bracket service base URL (default http://127.0.0.1:8080/api)
  BRACKET_CACHE_DIR          Local draft cache (default $XDG_CACHE_HOME/bracket-desk)
  BRACKET_API_TIMEOUT_SECS   Give up on service calls after this many seconds
  RUST_LOG                   Log filter (default warn)"
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(line: &str) -> Result<Cli, String> {
        let args: Vec<String> = line.split_whitespace().map(String::from).collect();
        parse_args(&args)
    }

    fn command(line: &str) -> Command {
        match parse(line) {
            Ok(Cli::Run { command, .. }) => command,
            other => panic!("{line}: {other:?}"),
        }
    }

    #[test]
    fn help_and_version() {
        assert_eq!(parse(""), Ok(Cli::Help));
        assert_eq!(parse("--help"), Ok(Cli::Help));
        assert_eq!(parse("-V"), Ok(Cli::Version));
        assert!(parse("--frobnicate").is_err());
    }

    #[test]
    fn show_is_the_default() {
        assert_eq!(
            parse("cup-7"),
            Ok(Cli::Run { tournament_id: "cup-7".into(), command: Command::Show })
        );
    }

    #[test]
    fn matches_are_one_based_on_the_command_line() {
        assert_eq!(
            command("cup slot 1 2 b ajax"),
            Command::Slot { round: 1, position: 1, slot_index: 1, target: SlotTarget::Team("ajax".into()) }
        );
        assert_eq!(
            command("cup slot 2 1 a winner:1:2"),
            Command::Slot {
                round: 2,
                position: 0,
                slot_index: 0,
                target: SlotTarget::Winner { round: 1, position: 1 }
            }
        );
        assert!(parse("cup slot 1 0 a bye").is_err());
    }

    #[test]
    fn results_with_and_without_tiebreak() {
        assert_eq!(
            command("cup result 1 1 2 0"),
            Command::Result { round: 1, position: 0, score: MatchScore::new(2, 0) }
        );
        assert_eq!(
            command("cup result 2 1 1 1 4 3"),
            Command::Result { round: 2, position: 0, score: MatchScore::new(1, 1).with_tiebreak(4, 3) }
        );
        assert!(parse("cup result 2 1 1 1 4").is_err());
    }

    #[test]
    fn schedule_options_parse() {
        let at = "2026-05-01T18:00:00Z".parse::<DateTime<Utc>>().unwrap();
        assert_eq!(
            command("cup schedule 1 1 --venue Court-1 --at 2026-05-01T20:00:00+02:00"),
            Command::Schedule { round: 1, position: 0, venue: Some("Court-1".into()), at: Some(at) }
        );
        assert!(parse("cup schedule 1 1").is_err());
        assert!(parse("cup schedule 1 1 --venue").is_err());
    }

    #[test]
    fn reset_needs_confirmation() {
        assert!(parse("cup reset").is_err());
        assert_eq!(command("cup reset --yes"), Command::Reset);
    }

    #[test]
    fn status_names() {
        assert_eq!(
            command("cup status 1 2 postponed"),
            Command::Status { round: 1, position: 1, status: MatchStatus::Postponed }
        );
        assert!(parse("cup status 1 2 completed").is_err());
    }

    #[test]
    fn advances_read_naturally() {
        let team = bracket_api::Team::new("ajax", "Ajax");
        assert_eq!(
            describe_advance(&Advance::Placed { team: team.clone(), round: 2, position: 0, slot: 1 }),
            "Ajax moves to round 2 match 1 (second slot)"
        );
        assert_eq!(describe_advance(&Advance::Champion(team)), "Ajax wins the tournament");
    }
}
