//! CLI for kinolern.
//!
//! `explore` runs an interactive refinement session in the terminal: it shows the
//! active round, collects likes and dislikes and drives the session controller.
//! `recommend` sends a single request and prints the raw candidates.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use kinolern_core::{Candidate, ItemIndex, Preference, RecommendRequest};
use kinolern_session::{HttpRecommender, RecommendationService, Session, SessionError};
use std::fs;
use std::io::{self, BufRead, Read, Write};
use std::path::PathBuf;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

const POSTER_BASE: &str = "https://image.tmdb.org/t/p/w342";
const TRAILER_BASE: &str = "https://www.youtube.com/embed/";
const MAX_GENRES: usize = 4;
const MAX_ACTORS: usize = 6;
const REFRESH_WARNING: &str = "If you refresh this round, the preferences you have set for these movies will be lost. Are you sure you want to continue? [y/N]";

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Base URL of the recommendation service (default: $KINOLERN_API_URL)
    #[arg(long, global = true)]
    api_url: Option<String>,

    /// Request timeout in seconds (default: 10)
    #[arg(long, global = true, default_value = "10")]
    timeout_secs: u64,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Explore recommendations interactively, round by round
    Explore,
    /// Send one request (JSON from a file or stdin) and print the candidates
    Recommend {
        /// Request file; reads stdin when omitted
        #[arg(long)]
        input: Option<PathBuf>,
    },
}

/// One line typed at the `explore` prompt.
#[derive(Debug, PartialEq)]
enum Command {
    Rate(ItemIndex, Preference),
    Clear(ItemIndex),
    Next,
    Back(u32),
    Refresh,
    More,
    New,
    Show(ItemIndex),
    Rounds,
    Help,
    Quit,
}

fn parse_command(line: &str) -> std::result::Result<Command, String> {
    let mut parts = line.split_whitespace();
    let Some(verb) = parts.next() else {
        return Err("empty command".to_string());
    };
    let arg = parts.next();
    if parts.next().is_some() {
        return Err(format!("too many arguments for '{verb}'"));
    }

    let item = |arg: Option<&str>| -> std::result::Result<ItemIndex, String> {
        let raw = arg.ok_or_else(|| format!("'{verb}' needs an item id"))?;
        raw.parse()
            .map_err(|_| format!("'{raw}' is not a valid item id"))
    };

    let cmd = match verb.to_ascii_lowercase().as_str() {
        "like" | "+" => Command::Rate(item(arg)?, Preference::Like),
        "dislike" | "-" => Command::Rate(item(arg)?, Preference::Dislike),
        "clear" => Command::Clear(item(arg)?),
        "show" => Command::Show(item(arg)?),
        "back" => {
            let raw = arg.ok_or("'back' needs a round number")?;
            let round = raw
                .parse()
                .map_err(|_| format!("'{raw}' is not a valid round number"))?;
            Command::Back(round)
        }
        other if arg.is_some() => return Err(format!("'{other}' takes no arguments")),
        "next" => Command::Next,
        "refresh" => Command::Refresh,
        "more" => Command::More,
        "new" => Command::New,
        "rounds" => Command::Rounds,
        "help" | "?" => Command::Help,
        "quit" | "exit" | "q" => Command::Quit,
        other => return Err(format!("unknown command '{other}' (try 'help')")),
    };
    Ok(cmd)
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();
}

fn mark(pref: Option<Preference>) -> char {
    match pref {
        Some(Preference::Like) => '+',
        Some(Preference::Dislike) => '-',
        _ => ' ',
    }
}

fn render<W: Write>(session: &Session, out: &mut W) -> io::Result<()> {
    let view = session.view();
    writeln!(out, "== Round {} ==", view.round_number)?;
    for (n, row) in view.candidate_rows.iter().enumerate() {
        if n > 0 {
            writeln!(out, "   --")?;
        }
        for cand in row {
            let pref = view.feedback.get(&cand.item_index).copied();
            writeln!(out, " {} {:>7}  {}", mark(pref), cand.item_index, cand.label())?;
        }
    }
    if let Some(msg) = &view.error_message {
        writeln!(out, "! {msg}")?;
    }
    Ok(())
}

fn names(cands: &[Candidate]) -> String {
    if cands.is_empty() {
        "-".to_string()
    } else {
        cands.iter().map(Candidate::label).collect::<Vec<_>>().join(", ")
    }
}

fn render_rounds<W: Write>(session: &Session, out: &mut W) -> io::Result<()> {
    let rounds = session.rounds();
    if rounds.is_empty() {
        return writeln!(out, "No completed rounds yet.");
    }
    for round in rounds {
        let groups: Vec<String> = Preference::GROUPS
            .iter()
            .map(|&pref| format!("{}: {}", group_name(pref), names(round.movies.group(pref))))
            .collect();
        writeln!(out, "Round {}: {}", round.number, groups.join(" | "))?;
    }
    Ok(())
}

fn group_name(pref: Preference) -> &'static str {
    match pref {
        Preference::Like => "liked",
        Preference::Neutral => "neutral",
        Preference::Dislike => "disliked",
    }
}

fn describe(cand: &Candidate) -> Vec<String> {
    let mut lines = vec![format!("{} ({})", cand.label(), cand.item_index)];
    let genres: Vec<&str> = cand.genres().into_iter().take(MAX_GENRES).collect();
    if !genres.is_empty() {
        lines.push(format!("Genres:    {}", genres.join(", ")));
    }
    let directors = cand.directors();
    if !directors.is_empty() {
        lines.push(format!("Directors: {}", directors.join(", ")));
    }
    let actors: Vec<&str> = cand.actors().into_iter().take(MAX_ACTORS).collect();
    if !actors.is_empty() {
        lines.push(format!("Cast:      {}", actors.join(", ")));
    }
    let languages = cand.languages();
    if !languages.is_empty() {
        lines.push(format!("Languages: {}", languages.join(", ")));
    }
    if let Some(poster) = cand.poster_path().filter(|p| !p.is_empty()) {
        lines.push(format!("Poster:    {POSTER_BASE}{poster}"));
    }
    if let Some(trailer) = cand.trailer_ids().first() {
        lines.push(format!("Trailer:   {TRAILER_BASE}{trailer}?fs=1"));
    }
    lines
}

fn print_help<W: Write>(out: &mut W) -> io::Result<()> {
    writeln!(
        out,
        "Commands:
  like <id>      mark a movie as liked (again to unset)
  dislike <id>   mark a movie as disliked (again to unset)
  clear <id>     reset a movie to neutral
  next           save this round and get new movies
  back <round>   return to an earlier round
  refresh        replace the movies of this round
  more           add more movies to this round (once per round)
  new            start over
  show <id>      movie details
  rounds         list completed rounds
  quit"
    )
}

fn confirmed<I: Iterator<Item = io::Result<String>>, W: Write>(
    lines: &mut I,
    out: &mut W,
) -> Result<bool> {
    writeln!(out, "{REFRESH_WARNING}")?;
    out.flush()?;
    let answer = lines.next().transpose()?.unwrap_or_default();
    Ok(matches!(answer.trim().to_ascii_lowercase().as_str(), "y" | "yes"))
}

fn report<W: Write>(out: &mut W, result: std::result::Result<(), SessionError>) -> io::Result<()> {
    match result {
        Ok(()) => Ok(()),
        // Already part of the rendered view.
        Err(SessionError::OperationFailed { .. }) => Ok(()),
        Err(e) => writeln!(out, "! {e}"),
    }
}

async fn run_explore<S, R, W>(service: &S, input: R, out: &mut W) -> Result<()>
where
    S: RecommendationService + ?Sized,
    R: BufRead,
    W: Write,
{
    let mut session = Session::new();
    // A failed start is shown in the view; `new` retries.
    let started = session.initialize(service).await;
    report(out, started)?;
    render(&session, out)?;

    let mut lines = input.lines();
    loop {
        write!(out, "> ")?;
        out.flush()?;
        let Some(line) = lines.next().transpose().context("Failed to read command")? else {
            break;
        };
        if line.trim().is_empty() {
            continue;
        }

        let cmd = match parse_command(&line) {
            Ok(cmd) => cmd,
            Err(msg) => {
                writeln!(out, "! {msg}")?;
                continue;
            }
        };

        let result = match cmd {
            Command::Quit => break,
            Command::Help => {
                print_help(out)?;
                continue;
            }
            Command::Rounds => {
                render_rounds(&session, out)?;
                continue;
            }
            Command::Show(item) => {
                match session.find_candidate(item) {
                    Some(cand) => {
                        for l in describe(cand) {
                            writeln!(out, "{l}")?;
                        }
                    }
                    None => writeln!(out, "! no movie with id {item} in this session")?,
                }
                continue;
            }
            Command::Rate(item, pref) => session.set_feedback(item, pref).map(|_| ()),
            Command::Clear(item) => session
                .set_feedback(item, Preference::Neutral)
                .map(|_| ()),
            Command::Back(round) => session.rewind_round(round),
            Command::Next => session.advance_round(service).await,
            Command::More => session.expand_round(service).await,
            Command::New => session.new_session(service).await,
            Command::Refresh => {
                if session.refresh_needs_confirmation() && !confirmed(&mut lines, out)? {
                    continue;
                }
                session.refresh_round(service, true).await
            }
        };

        report(out, result)?;
        render(&session, out)?;
    }

    Ok(())
}

async fn run_recommend<S>(service: &S, input: Option<PathBuf>) -> Result<()>
where
    S: RecommendationService + ?Sized,
{
    let raw = match &input {
        Some(path) => fs::read_to_string(path)
            .with_context(|| format!("Failed to read request file {}", path.display()))?,
        None => {
            let mut buf = String::new();
            io::stdin()
                .read_to_string(&mut buf)
                .context("Failed to read request from stdin")?;
            buf
        }
    };

    let request: RecommendRequest = if raw.trim().is_empty() {
        RecommendRequest::default()
    } else {
        serde_json::from_str(&raw).context("Request is not a valid recommendation request")?
    };

    let response = service
        .recommend(&request)
        .await
        .context("Recommendation request failed")?;

    serde_json::to_writer_pretty(io::stdout(), &response)?;
    println!();
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();
    let cli = Cli::parse();

    let timeout = Duration::from_secs(cli.timeout_secs);
    let service = match &cli.api_url {
        Some(base) => HttpRecommender::new(base, timeout),
        None => HttpRecommender::from_env(timeout),
    }
    .context("Failed to set up recommendation client")?;
    tracing::debug!("using endpoint {}", service.endpoint());

    match cli.command {
        Commands::Explore => {
            let stdin = io::stdin();
            let mut stdout = io::stdout();
            run_explore(&service, stdin.lock(), &mut stdout).await?;
        }
        Commands::Recommend { input } => run_recommend(&service, input).await?,
    }

    Ok(())
}
