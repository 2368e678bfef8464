use clap::{ArgAction, Parser, ValueEnum};

const CMD_NAME: &str = "gqc";

/// Organism class passed to quartet's telomere search.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OrganismType {
    Plant,
    Animal,
    Fungi,
    Protist,
}

impl OrganismType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Plant => "plant",
            Self::Animal => "animal",
            Self::Fungi => "fungi",
            Self::Protist => "protist",
        }
    }
}

/// Stores our command-line args format.
#[derive(Parser, Debug)]
#[command(name = CMD_NAME, version, about = "Genome assembly quality control", long_about = None)]
pub struct Args {
    /// Genome assembly (FASTA)
    #[arg(short, long, value_name = "FASTA")]
    #[arg(env = "GENOME_QC_GENOME")]
    pub genome: String,

    /// Output directory
    #[arg(short, long, value_name = "DIR")]
    #[arg(env = "GENOME_QC_OUTPUT")]
    pub output: String,

    /// Threads given to each tool
    #[arg(short, long, value_name = "N", default_value_t = 1)]
    pub threads: usize,

    /// BUSCO lineages or local lineage directories
    #[arg(short, long = "busco", value_name = "DB", num_args = 1.., required = true)]
    pub busco: Vec<String>,

    /// Reference genome for QUAST and synteny
    #[arg(short, long, value_name = "FASTA")]
    pub reference: Option<String>,

    /// Organism class for telomere detection
    #[arg(short = 'c', long, value_enum, default_value_t = OrganismType::Plant)]
    pub organism_type: OrganismType,

    /// Minimum telomere length
    #[arg(short, long, value_name = "BP", default_value_t = 50)]
    pub min_telomere_length: u32,

    /// Write PBS scripts and submit them instead of running tools here
    #[arg(long)]
    pub cluster: bool,

    /// PBS queue
    #[arg(long, value_name = "QUEUE", default_value = "high")]
    pub pbs_queue: String,

    /// PBS nodes per job
    #[arg(long, value_name = "N", default_value_t = 1)]
    pub pbs_nodes: u32,

    /// PBS processors per node
    #[arg(long, value_name = "N", default_value_t = 60)]
    pub pbs_ppn: u32,

    /// PBS walltime
    #[arg(long, value_name = "HH:MM:SS", default_value = "240:00:00")]
    pub pbs_walltime: String,

    /// With --cluster: write scripts but don't submit them
    #[arg(long)]
    pub dry_run: bool,

    /// Bypass user confirmation
    #[arg(short, long)]
    pub yes: bool,

    /// Print additional debugging info (repeat for more)
    #[arg(short, long, action = ArgAction::Count)]
    pub verbose: u8,

    /// Managed-environment manager
    #[arg(long, value_name = "EXE", default_value = "micromamba")]
    #[arg(env = "GENOME_QC_ENV_MANAGER")]
    pub env_manager: String,

    /// Environment-modules command
    #[arg(long, value_name = "EXE", default_value = "modulecmd")]
    pub module_cmd: String,

    /// Batch submission command
    #[arg(long, value_name = "EXE", default_value = "qsub")]
    #[arg(env = "GENOME_QC_SUBMIT_CMD")]
    pub submit_cmd: String,

    /// Time limit for tool availability checks
    #[arg(long, value_name = "SECONDS", default_value_t = 60)]
    pub probe_timeout: u64,
}
