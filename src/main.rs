use std::io::Write;

use futures_util::StreamExt;
use genbridge::config::{load_config, AppConfig};
use genbridge::error::AdapterError;
use genbridge::observability::init_tracing;
use genbridge::protocol::gemini::{
    Content, CountTokensRequest, GenerateContentRequest, GenerateContentResponse,
};
use genbridge::{ContentGenerator, CustomApiGenerator};

const DEFAULT_CONFIG_PATH: &str = "config.yaml";
const CONFIG_PATH_ENV: &str = "GENBRIDGE_CONFIG";
const USAGE: &str = "usage: genbridge [--stream | --count] <prompt>";

#[derive(Debug, thiserror::Error)]
enum CliError {
    #[error(transparent)]
    Adapter(#[from] AdapterError),
    #[error("Failed to write output: {0}")]
    Output(#[from] std::io::Error),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mode {
    Generate,
    Stream,
    Count,
}

fn parse_args(args: impl IntoIterator<Item = String>) -> Result<(Mode, String), String> {
    let mut mode = Mode::Generate;
    let mut words = Vec::new();
    for arg in args {
        match arg.as_str() {
            "--stream" => mode = Mode::Stream,
            "--count" => mode = Mode::Count,
            "-h" | "--help" => return Err(USAGE.to_string()),
            flag if flag.starts_with("--") => return Err(format!("unknown flag {flag}\n{USAGE}")),
            _ => words.push(arg),
        }
    }
    if words.is_empty() {
        return Err(USAGE.to_string());
    }
    Ok((mode, words.join(" ")))
}

fn main() {
    let (mode, prompt) = parse_args(std::env::args().skip(1)).unwrap_or_else(|msg| {
        eprintln!("{msg}");
        std::process::exit(2);
    });

    let config_path =
        std::env::var(CONFIG_PATH_ENV).unwrap_or_else(|_| DEFAULT_CONFIG_PATH.to_string());
    let config = load_config(&config_path).unwrap_or_else(|e| {
        eprintln!("Failed to load configuration from '{config_path}': {e}");
        eprintln!("Please copy 'config.example.yaml' to 'config.yaml' and modify as needed.");
        std::process::exit(1);
    });

    init_tracing(&config.features.log_level);

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_io()
        .enable_time()
        .build()
        .unwrap_or_else(|e| {
            eprintln!("Failed to initialize Tokio runtime: {e}");
            std::process::exit(1);
        });

    if let Err(err) = runtime.block_on(run(&config, mode, prompt)) {
        eprintln!("{err}");
        std::process::exit(1);
    }
}

async fn run(config: &AppConfig, mode: Mode, prompt: String) -> Result<(), CliError> {
    let generator = CustomApiGenerator::from_config(config)?;
    tracing::info!(
        endpoint = %generator.backend().endpoint,
        model = generator.backend().wire_model(),
        "genbridge starting"
    );

    let contents = vec![Content::user_text(prompt)];
    match mode {
        Mode::Count => {
            let request = CountTokensRequest {
                model: None,
                contents,
            };
            let counted = generator.count_tokens(&request).await?;
            println!("{}", counted.total_tokens);
        }
        Mode::Generate => {
            let request = GenerateContentRequest::from_contents(contents);
            let response = generator.generate_content(&request).await?;
            print_response_text(&response.text());
            for call in response.function_calls() {
                println!("[function call] {} {}", call.name, call.args);
            }
        }
        Mode::Stream => {
            let request = GenerateContentRequest::from_contents(contents);
            let mut stream = generator.generate_content_stream(&request).await?;
            let mut stdout = std::io::stdout();
            while let Some(item) = stream.next().await {
                write_stream_item(&mut stdout, &item?)?;
            }
            writeln!(stdout)?;
        }
    }
    Ok(())
}

/// Write one streamed response as it arrives; the first failed write ends
/// the stream.
fn write_stream_item(out: &mut impl Write, response: &GenerateContentResponse) -> std::io::Result<()> {
    write!(out, "{}", response.text())?;
    for call in response.function_calls() {
        writeln!(out, "\n[function call] {} {}", call.name, call.args)?;
    }
    out.flush()
}

fn print_response_text(text: &str) {
    if !text.is_empty() {
        println!("{text}");
    }
}
