//! Voicepick CLI - Character Voice Browser
//!
//! Browse characters, search and play their voice lines, and add new ones.

use clap::{Parser, Subcommand};
use colored::Colorize;
use std::env;
use std::path::{Path, PathBuf};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::time::Instant;
use tracing_subscriber::EnvFilter;
use voicepick_core::filter::filter;
use voicepick_core::{
    AdminMode, AudioCommand, AudioRef, Config, FormState, Intonation, OpenAiSuggestionGateway,
    Page, PickerEvent, PlaybackState, RecordingOutput, SuggestionGateway, SuggestionOutcome,
    SuggestionRequest, TransitionPhase, VoicePicker, default_config,
};

#[derive(Parser)]
#[command(
    name = "voicepick",
    version,
    about = "Character voice browser - pick a character, search and play its lines",
    long_about = "Browse characters and their voice lines. In admin mode, new lines can be added, with text suggested by an OpenAI-compatible API."
)]
struct Cli {
    /// Path to a TOML configuration file
    #[arg(short, long, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Disable admin mode even if the configuration enables it
    #[arg(long)]
    no_admin: bool,

    /// Log filter used when RUST_LOG is not set
    #[arg(long, default_value = "warn", value_name = "LEVEL")]
    log_level: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// List the characters
    List,
    /// Show a character's dialogues
    Show {
        /// Character id
        #[arg(value_name = "ID")]
        id: String,

        /// Only show lines containing this text
        #[arg(short, long, value_name = "TERM")]
        search: Option<String>,

        /// Print as JSON
        #[arg(long)]
        json: bool,
    },
    /// Ask the text generator for a new line for a character
    Suggest {
        #[arg(value_name = "ID")]
        id: String,
    },
    /// Interactive session
    Browse,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load environment variables from .env file if present
    dotenvy::dotenv().ok();

    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&cli.log_level)),
        )
        .with_writer(std::io::stderr)
        .init();

    let config = match &cli.config {
        Some(path) => Config::load(path)?,
        None => default_config(),
    };
    let admin = AdminMode::from(config.admin.enabled && !cli.no_admin);

    match cli.command {
        Command::List => {
            let picker = VoicePicker::new(&config, admin, Box::new(RecordingOutput::new()))?;
            render_selection(&picker);
        }
        Command::Show { id, search, json } => {
            let picker = VoicePicker::new(&config, admin, Box::new(RecordingOutput::new()))?;
            let Some(character) = picker.catalog().find_character(&id) else {
                eprintln!("{} Unknown character '{}'.", "Error:".red().bold(), id);
                std::process::exit(1);
            };
            let found = filter(&character.dialogues, search.as_deref().unwrap_or(""));
            if json {
                println!("{}", serde_json::to_string_pretty(&found)?);
            } else {
                println!("{}", character.name.bright_cyan().bold());
                for dialogue in found {
                    println!(
                        "  [{}] \"{}\" {}",
                        dialogue.id,
                        dialogue.text,
                        badge(dialogue.intonation)
                    );
                }
            }
        }
        Command::Suggest { id } => {
            let gateway = build_gateway(&config)?;
            let picker = VoicePicker::new(&config, admin, Box::new(RecordingOutput::new()))?;
            let Some(character) = picker.catalog().find_character(&id) else {
                eprintln!("{} Unknown character '{}'.", "Error:".red().bold(), id);
                std::process::exit(1);
            };
            let response = gateway.suggest(SuggestionRequest::from(character)).await?;
            println!("{}", response.suggested_text);
        }
        Command::Browse => browse(&config, admin).await?,
    }

    Ok(())
}

/// Build the suggestion gateway from environment configuration.
fn build_gateway(config: &Config) -> Result<OpenAiSuggestionGateway, Box<dyn std::error::Error>> {
    let api_base = env::var("OPENAI_API_BASE")
        .or_else(|_| env::var("OPENAI_BASE_URL"))
        .unwrap_or_else(|_| "https://api.openai.com/v1".to_string());

    let api_key = env::var("OPENAI_API_KEY").unwrap_or_else(|_| {
        eprintln!(
            "{}",
            "Warning: OPENAI_API_KEY not set. Suggestions may fail.".yellow()
        );
        String::new()
    });

    Ok(OpenAiSuggestionGateway::new(
        &api_base,
        &api_key,
        config.suggestion.clone(),
    )?)
}

async fn browse(config: &Config, admin: AdminMode) -> Result<(), Box<dyn std::error::Error>> {
    let gateway = build_gateway(config)?;
    let output = RecordingOutput::new();
    let mut picker = VoicePicker::new(config, admin, Box::new(output.clone()))?
        .with_callback(create_console_callback());

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    tracing::info!(admin = admin.is_enabled(), "Interactive session started");

    render(&picker);
    print_prompt();

    loop {
        let deadline = picker.next_deadline();
        tokio::select! {
            line = lines.next_line() => {
                let Some(line) = line? else { break };
                if !handle_command(line.trim(), &mut picker, &gateway).await {
                    break;
                }
                forward_audio(&output, &mut picker);
                print_prompt();
            }
            _ = sleep_until(deadline) => {
                let was_exiting = picker.phase() == TransitionPhase::Exiting;
                picker.poll(Instant::now());
                forward_audio(&output, &mut picker);
                if was_exiting && picker.phase() != TransitionPhase::Exiting {
                    render(&picker);
                    print_prompt();
                }
            }
        }
    }

    Ok(())
}

async fn sleep_until(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => tokio::time::sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}

/// Print audio commands. The console has no device, so every pause is
/// confirmed right away.
fn forward_audio(output: &RecordingOutput, picker: &mut VoicePicker) {
    loop {
        let commands = output.drain();
        if commands.is_empty() {
            break;
        }
        for command in commands {
            match command {
                AudioCommand::Play(handle, src) => {
                    println!("  {} {} {}", "♪".bright_green(), handle, src.to_string().dimmed());
                }
                AudioCommand::Pause(handle) => picker.on_external_pause(handle),
            }
        }
    }
}

/// Handle one line of input. Returns false when the session should end.
async fn handle_command(
    line: &str,
    picker: &mut VoicePicker,
    gateway: &dyn SuggestionGateway,
) -> bool {
    match run_command(line, picker, gateway).await {
        Ok(keep_going) => keep_going,
        Err(e) => {
            println!("{} {}", "Error:".red().bold(), e);
            true
        }
    }
}

async fn run_command(
    line: &str,
    picker: &mut VoicePicker,
    gateway: &dyn SuggestionGateway,
) -> Result<bool, Box<dyn std::error::Error>> {
    let (command, arg) = line
        .split_once(char::is_whitespace)
        .map(|(c, a)| (c, a.trim()))
        .unwrap_or((line, ""));
    let now = Instant::now();

    match command {
        "" => {}
        "quit" | "exit" => return Ok(false),
        "help" => print_help(picker.admin()),
        "list" | "show" => render(picker),
        "select" => picker.select_character(arg, now),
        "back" => picker.back(now),
        "search" => {
            picker.set_search(arg);
            render(picker);
        }
        "play" => {
            picker.play(parse_dialogue_id(arg)?, now)?;
        }
        "pause" => picker.pause(parse_dialogue_id(arg)?)?,
        "toggle" => {
            picker.toggle(parse_dialogue_id(arg)?, now)?;
        }
        "end" => {
            if let Some(handle) = picker.playing_dialogue().and_then(|id| picker.session_for(id)) {
                picker.on_natural_end(handle);
            }
        }
        "add" => {
            picker.open_form()?;
            render_form(picker);
        }
        "text" => {
            picker.form_mut().set_text(arg)?;
            render_form(picker);
        }
        "audio" => {
            let audio = audio_ref_from_path(arg)?;
            picker.form_mut().set_audio(Some(audio))?;
            render_form(picker);
        }
        "intonation" => {
            let intonation: Intonation = arg.parse()?;
            picker.form_mut().set_intonation(intonation)?;
            render_form(picker);
        }
        "suggest" => {
            println!("  {}", "Génération...".dimmed());
            if picker.request_suggestion(gateway).await? != SuggestionOutcome::Discarded {
                render_form(picker);
            }
        }
        "submit" => match picker.submit_form() {
            Ok(_) => render(picker),
            Err(e) => {
                render_form(picker);
                return Err(e.into());
            }
        },
        "cancel" => picker.cancel_form(),
        other => return Err(format!("unknown command '{}', try 'help'", other).into()),
    }

    Ok(true)
}

fn parse_dialogue_id(arg: &str) -> Result<u64, String> {
    arg.parse()
        .map_err(|_| format!("expected a dialogue number, got '{}'", arg))
}

/// Turn a picked file into a playable reference. Contents are not inspected.
fn audio_ref_from_path(path: &str) -> Result<AudioRef, Box<dyn std::error::Error>> {
    if path.is_empty() {
        return Err("expected a path to an audio file".into());
    }
    let path = Path::new(path)
        .canonicalize()
        .map_err(|e| format!("cannot use '{}': {}", path, e))?;
    if !path.is_file() {
        return Err(format!("'{}' is not a file", path.display()).into());
    }
    Ok(AudioRef::new(format!("file://{}", path.display())))
}

fn render(picker: &VoicePicker) {
    match picker.navigation().page() {
        Page::Selection => render_selection(picker),
        Page::Detail => render_detail(picker),
    }
}

fn render_selection(picker: &VoicePicker) {
    println!();
    println!("{}", "═".repeat(70).bright_blue());
    println!("{}", "  Choisissez un personnage".bright_blue().bold());
    println!("{}", "═".repeat(70).bright_blue());
    for character in picker.characters() {
        println!();
        println!(
            "  {} {} {}",
            character.name.bright_cyan().bold(),
            format!("({})", character.id).dimmed(),
            format!("{} dialogues", character.dialogues.len()).yellow()
        );
        for line in textwrap(&character.description, 64).lines() {
            println!("    {}", line);
        }
    }
    println!();
}

fn render_detail(picker: &VoicePicker) {
    let Some(character) = picker.current_character() else {
        render_selection(picker);
        return;
    };

    println!();
    println!("{}", "═".repeat(70).bright_magenta());
    println!("  {}", character.name.bright_magenta().bold());
    for line in textwrap(&character.description, 66).lines() {
        println!("  {}", line.dimmed());
    }
    println!("{}", "═".repeat(70).bright_magenta());

    if !picker.search_term().trim().is_empty() {
        println!("  {} {}", "Recherche:".bold(), picker.search_term());
    }

    let entries = picker.visible_dialogues();
    if entries.is_empty() {
        println!();
        println!("  {}", "Aucun dialogue trouvé".bold());
        println!("  {}", "Essayez un autre terme de recherche.".dimmed());
    }
    for entry in entries {
        let marker = match entry.state {
            PlaybackState::Playing => "⏸".bright_green(),
            PlaybackState::Pending => "…".yellow(),
            PlaybackState::Stopped => "▶".bright_cyan(),
        };
        println!(
            "  {} [{}] \"{}\" {}",
            marker,
            entry.dialogue.id,
            entry.dialogue.text,
            badge(entry.dialogue.intonation)
        );
    }
    println!();
    render_form(picker);
}

fn render_form(picker: &VoicePicker) {
    let form = picker.form();
    if !form.is_open() {
        return;
    }
    println!("{}", "─".repeat(70).dimmed());
    println!("  {}", "Ajouter un nouveau dialogue".bold());
    println!("  Phrase     : {}", form.text());
    println!(
        "  Audio      : {}",
        form.audio().map(|a| a.to_string()).unwrap_or_else(|| "-".to_string())
    );
    println!("  Intonation : {}", badge(form.intonation()));
    if form.state() == FormState::SubmittingSuggestion {
        println!("  {}", "Génération...".dimmed());
    }
    if let Some(error) = form.error() {
        println!("  {}", error.red());
    }
    println!("{}", "─".repeat(70).dimmed());
}

fn badge(intonation: Intonation) -> colored::ColoredString {
    let label = format!("[{}]", intonation.display_name());
    match intonation {
        Intonation::Calm => label.blue(),
        Intonation::Whispered => label.dimmed(),
        Intonation::Shouted => label.red(),
        Intonation::Normal => label.normal(),
    }
}

fn print_prompt() {
    use std::io::Write;
    print!("{} ", ">".bright_blue());
    std::io::stdout().flush().ok();
}

fn print_help(admin: AdminMode) {
    println!("  select <id>        open a character");
    println!("  back               return to the character list");
    println!("  search [text]      filter dialogues (empty clears)");
    println!("  play|pause|toggle <n>  control dialogue n");
    println!("  end                mark the playing dialogue as finished");
    if admin.is_enabled() {
        println!("  add                open the add-dialogue form");
        println!("  text <phrase>      set the dialogue text");
        println!("  audio <path>       pick the audio file");
        println!("  intonation <tag>   calm, normal, whispered or shouted");
        println!("  suggest            ask for a suggested line");
        println!("  submit | cancel    save or discard the form");
    }
    println!("  quit");
}

/// Create a callback that prints picker events to the console.
fn create_console_callback() -> Box<dyn Fn(PickerEvent) + Send + Sync> {
    Box::new(move |event| match event {
        PickerEvent::CharacterNotFound { character_id } => {
            println!(
                "{} Unknown character '{}', back to the list.",
                "Warning:".yellow().bold(),
                character_id
            );
        }
        PickerEvent::PlaybackStarted { dialogue_id } => {
            println!("  {} dialogue {}", "▶".bright_green(), dialogue_id);
        }
        PickerEvent::PlaybackStopped { dialogue_id } => {
            println!("  {} dialogue {}", "■".dimmed(), dialogue_id);
        }
        PickerEvent::DialogueAdded {
            character_id,
            dialogue,
        } => {
            println!(
                "{} \"{}\" added to {}",
                "✓".bright_green().bold(),
                dialogue.text,
                character_id.bright_cyan()
            );
        }
        PickerEvent::PageCommitted { .. } => {
            // Rendered by the session loop
        }
    })
}

/// Simple text wrapping function.
fn textwrap(text: &str, width: usize) -> String {
    let mut result = String::new();
    let mut current_line_len = 0;

    for word in text.split_whitespace() {
        let word_len = word.chars().count();
        if current_line_len + word_len + 1 > width && current_line_len > 0 {
            result.push('\n');
            current_line_len = 0;
        }
        if current_line_len > 0 {
            result.push(' ');
            current_line_len += 1;
        }
        result.push_str(word);
        current_line_len += word_len;
    }

    result
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_textwrap_breaks_on_width() {
        let wrapped = textwrap("Le boute-en-train du groupe, plein d'humour.", 20);
        assert!(wrapped.lines().all(|l| l.chars().count() <= 20));
        assert_eq!(wrapped.replace('\n', " "), "Le boute-en-train du groupe, plein d'humour.");
    }

    #[test]
    fn test_audio_ref_from_missing_path() {
        assert!(audio_ref_from_path("").is_err());
        assert!(audio_ref_from_path("/definitely/not/here.mp3").is_err());
    }

    #[test]
    fn test_audio_ref_from_existing_file() {
        let path = std::env::temp_dir().join("voicepick-test-audio.mp3");
        std::fs::write(&path, b"ID3").unwrap();
        let audio = audio_ref_from_path(path.to_str().unwrap()).unwrap();
        assert!(audio.as_str().starts_with("file://"));
        assert!(audio.as_str().ends_with("voicepick-test-audio.mp3"));
        std::fs::remove_file(path).ok();
    }

    #[test]
    fn test_cli_parses_show() {
        let cli = Cli::try_parse_from(["voicepick", "show", "etienne", "--search", "café"]).unwrap();
        match cli.command {
            Command::Show { id, search, json } => {
                assert_eq!(id, "etienne");
                assert_eq!(search.as_deref(), Some("café"));
                assert!(!json);
            }
            _ => panic!("expected show"),
        }
    }
}
