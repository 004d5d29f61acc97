use anyhow::Result;
use clap::Parser;

#[derive(Parser, Debug)]
#[command(
    name = "dental-xray-report",
    version,
    about = "Detect findings on a dental radiograph and write a clinical PDF report"
)]
struct Cli {
    /// Radiograph to analyse (png/jpg)
    #[arg(short = 'i', long = "image")]
    image: Option<String>,

    /// PDF output path (default: [report].output from settings)
    #[arg(short = 'o', long = "output")]
    output: Option<String>,

    /// Replay a saved detector JSON instead of running the detector
    #[arg(long = "detector-output")]
    detector_output: Option<String>,

    /// Read extra settings from a local TOML file
    #[arg(short = 'r', long = "read-settings")]
    read_settings: Option<String>,

    /// Patient name printed in the report header
    #[arg(long = "patient-name")]
    patient_name: Option<String>,

    /// Patient sex printed in the report header
    #[arg(long = "patient-sex")]
    patient_sex: Option<String>,

    /// Patient birthdate printed in the report header
    #[arg(long = "patient-birthdate")]
    patient_birthdate: Option<String>,

    /// Dentist name printed in the report header
    #[arg(long = "dentist")]
    dentist: Option<String>,

    /// Show the finding classes and their colors and exit
    #[arg(long = "show-legend")]
    show_legend: bool,

    /// Show the tooth position classes and exit
    #[arg(long = "show-classes")]
    show_classes: bool,

    /// Classify every image in a folder (file<TAB>position per line) and exit
    #[arg(long = "classify")]
    classify: Option<String>,

    /// Enable verbose logging
    #[arg(long = "verbose")]
    verbose: bool,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    dental_xray_report::logging::init(cli.verbose)?;

    let config = dental_xray_report::Config {
        image: cli.image,
        output: cli.output,
        detector_output: cli.detector_output,
        settings_path: cli.read_settings,
        patient_name: cli.patient_name,
        patient_sex: cli.patient_sex,
        patient_birthdate: cli.patient_birthdate,
        dentist: cli.dentist,
        show_legend: cli.show_legend,
        show_classes: cli.show_classes,
        classify: cli.classify,
    };
    let output = dental_xray_report::run(config)?;
    if !output.is_empty() {
        println!("{}", output);
    }
    Ok(())
}
