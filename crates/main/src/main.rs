use std::error::Error;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};
use impact_report::chart::{self, ChartOptions};
use impact_report::fonts;
use impact_report::{ReportData, ReportError, DOWNLOAD_FILE_NAME};
use log::info;

/// Renders the Indian American economic impact report.
///
/// Fonts are looked up under `assets/fonts`, the directory named by
/// `IMPACT_REPORT_FONTS_DIR`, or the system Liberation or DejaVu fonts.
#[derive(Parser)]
#[command(author, version, about = "Economic impact report generator")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Render the report to a PDF file.
    Render {
        /// Destination of the PDF.
        #[arg(short, long, default_value = DOWNLOAD_FILE_NAME)]
        output: PathBuf,

        /// JSON dataset to render instead of the built-in 2025 figures.
        #[arg(long, env = "IMPACT_REPORT_DATA")]
        data: Option<PathBuf>,
    },

    /// Export the bar and pie charts as PNG files.
    Charts {
        #[arg(short, long, default_value = ".")]
        output_dir: PathBuf,

        #[arg(long, env = "IMPACT_REPORT_DATA")]
        data: Option<PathBuf>,
    },

    /// Serve the one-button web form.
    Serve {
        #[arg(long, env = "IMPACT_REPORT_ADDR", default_value = "127.0.0.1:8501")]
        addr: SocketAddr,

        #[arg(long, env = "IMPACT_REPORT_DATA")]
        data: Option<PathBuf>,
    },
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Render { output, data } => render(&output, data.as_deref()),
        Commands::Charts { output_dir, data } => charts(&output_dir, data.as_deref()),
        Commands::Serve { addr, data } => serve(addr, data.as_deref()),
    };

    if let Err(err) = result {
        eprintln!("Error: {}", err);
        print_error_sources(err.as_ref());
        std::process::exit(1);
    }
}

fn load_data(path: Option<&Path>) -> Result<ReportData, ReportError> {
    match path {
        Some(path) => {
            info!("Loading dataset from {}", path.display());
            ReportData::from_json_path(path)
        }
        None => Ok(ReportData::diaspora_2025()),
    }
}

fn render(output: &Path, data: Option<&Path>) -> Result<(), Box<dyn Error>> {
    let data = load_data(data)?;
    let pdf = impact_report::generate_pdf(&data)?;
    std::fs::write(output, &pdf.bytes)?;
    info!("Saved report to {}", output.display());
    Ok(())
}

fn charts(output_dir: &Path, data: Option<&Path>) -> Result<(), Box<dyn Error>> {
    let data = load_data(data)?;
    data.validate()?;
    let fonts = fonts::default_font_set()?;
    let options = ChartOptions::default();

    std::fs::create_dir_all(output_dir)?;
    let bar_path = output_dir.join("bar_chart.png");
    chart::save_png(&chart::render_bar_chart(&data, &fonts, &options)?, &bar_path)?;
    let pie_path = output_dir.join("pie_chart.png");
    chart::save_png(&chart::render_pie_chart(&data, &fonts, &options)?, &pie_path)?;

    info!(
        "Saved charts to {} and {}",
        bar_path.display(),
        pie_path.display()
    );
    Ok(())
}

fn serve(addr: SocketAddr, data: Option<&Path>) -> Result<(), Box<dyn Error>> {
    let data = load_data(data)?;
    data.validate()?;
    if !fonts::default_fonts_available() {
        log::warn!(
            "No report fonts found; set {} before generating reports",
            fonts::FONTS_DIR_ENV
        );
    }

    let runtime = tokio::runtime::Runtime::new()?;
    runtime.block_on(impact_report::server::serve(addr, data))?;
    Ok(())
}

fn print_error_sources(mut error: &(dyn Error + 'static)) {
    while let Some(source) = error.source() {
        eprintln!("  caused by: {}", source);
        error = source;
    }
}
