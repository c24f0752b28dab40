use anyhow::{Result, anyhow};
use clap::Parser;

use tarjama::ImprovementRequest;

#[derive(Parser, Debug)]
#[command(
    name = "tarjama",
    version,
    about = "Extract and translate Arabic text from images, export the results as PDF"
)]
struct Cli {
    /// Image to translate (repeat for a batch, processed in order)
    #[arg(short = 'd', long = "data")]
    data: Vec<String>,

    /// PDF output path (default: file name from settings [report])
    #[arg(short = 'o', long = "output")]
    output: Option<String>,

    /// Submit a translation correction instead of translating
    #[arg(long = "improve", requires_all = ["arabic_text", "initial", "corrected"])]
    improve: bool,

    /// Original Arabic text for --improve
    #[arg(long = "arabic-text")]
    arabic_text: Option<String>,

    /// Translation that was produced for --improve
    #[arg(long = "initial")]
    initial: Option<String>,

    /// Corrected translation for --improve
    #[arg(long = "corrected")]
    corrected: Option<String>,

    /// Run the HTTP server
    #[arg(long = "server")]
    server: bool,

    /// Server bind address (default: settings [server] addr)
    #[arg(long = "addr", requires = "server")]
    addr: Option<String>,

    /// Model name or provider:model (e.g. gemini:gemini-2.0-flash)
    #[arg(short = 'm', long = "model")]
    model: Option<String>,

    /// API key (overrides environment variables)
    #[arg(short = 'k', long = "key")]
    key: Option<String>,

    /// Read extra settings from a local TOML file
    #[arg(short = 'r', long = "read-settings")]
    read_settings: Option<String>,

    /// Enable verbose logging
    #[arg(long = "verbose")]
    verbose: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    tarjama::logging::init(cli.verbose)?;

    let config = tarjama::Config {
        model: cli.model,
        key: cli.key,
        settings_path: cli.read_settings,
    };

    if cli.server {
        return tarjama::serve(&config, cli.addr).await;
    }

    if cli.improve {
        let request = ImprovementRequest {
            arabic_text: cli.arabic_text.unwrap_or_default(),
            initial_translation: cli.initial.unwrap_or_default(),
            corrected_translation: cli.corrected.unwrap_or_default(),
        };
        let output = tarjama::improve(&config, request).await?;
        println!("{}", output);
        return Ok(());
    }

    if cli.data.is_empty() {
        return Err(anyhow!(
            "no images given; pass one or more --data <FILE>, --improve or --server"
        ));
    }
    let output = tarjama::translate_files(&config, cli.data, cli.output).await?;
    println!("{}", output);
    Ok(())
}
