use std::path::{Path, PathBuf};

use crate::env::ToolRequest;
use crate::exec::ToolProbe;

use super::{Stage, StagePlan, StageWork, Step};

/// Inputs shared by all the standard stages.
#[derive(Debug, Clone)]
pub struct StageSettings {
    pub genome: PathBuf,
    pub threads: usize,
    /// quartet's organism class: plant, animal, fungi or protist
    pub organism: String,
    pub min_telomere_length: u32,
    pub reference: Option<PathBuf>,
    /// lineage names, local lineage directories, or `auto`
    pub busco_dbs: Vec<String>,
}

impl StageSettings {
    fn genome_arg(&self) -> String {
        path_arg(&self.genome)
    }

    /// e.g. `asm.fa`
    fn genome_name(&self) -> String {
        self.genome
            .file_name()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "genome".to_owned())
    }

    /// e.g. `asm`
    fn genome_stem(&self) -> String {
        self.genome
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "genome".to_owned())
    }
}

fn path_arg(path: &Path) -> String {
    path.display().to_string()
}

/// The fixed analysis sequence.
pub fn standard_stages(settings: &StageSettings) -> Vec<Box<dyn Stage>> {
    let mut stages: Vec<Box<dyn Stage>> = Vec::with_capacity(5 + settings.busco_dbs.len());
    stages.push(Box::new(TelomereGap(settings.clone())));
    for db in &settings.busco_dbs {
        stages.push(Box::new(Busco::new(settings.clone(), db)));
    }
    stages.push(Box::new(Merqury));
    stages.push(Box::new(Ltr(settings.clone())));
    stages.push(Box::new(Quast(settings.clone())));
    stages.push(Box::new(Synteny(settings.clone())));
    stages
}

// TELOMERE / GAP ////////////

/// quartet's TeloExplorer if it's installed, else plain seqkit statistics.
pub struct TelomereGap(StageSettings);

const QUARTET_CANDIDATES: [(&str, &[&str]); 2] =
    [("quartet.py", &["--help"]), ("quartet", &["--help"])];

impl Stage for TelomereGap {
    fn key(&self) -> String {
        "telomere_gap".to_owned()
    }

    fn title(&self) -> String {
        "TELOMERE AND GAP ANALYSIS".to_owned()
    }

    fn job_name(&self) -> String {
        "TELOMERE_GAP".to_owned()
    }

    fn dir_name(&self) -> &str {
        "telomere_gap"
    }

    fn plan(&self, probe: &ToolProbe<'_>, workdir: &Path) -> StagePlan {
        let s = &self.0;
        if let Some(quartet) = probe.first_available(&QUARTET_CANDIDATES) {
            log::info!("Using {quartet} for telomere and gap analysis");
            let prefix = s.genome_stem();
            let step = Step::direct([
                quartet.to_owned(),
                "TeloExplorer".to_owned(),
                "-i".to_owned(),
                s.genome_arg(),
                "-c".to_owned(),
                s.organism.clone(),
                "-m".to_owned(),
                s.min_telomere_length.to_string(),
                "-p".to_owned(),
                prefix.clone(),
            ]);
            return StagePlan::Run(
                StageWork::new("quartet", vec![step])
                    .detail("prefix", prefix)
                    .detail("organism_type", s.organism.clone())
                    .detail("min_length", s.min_telomere_length.to_string()),
            );
        }

        log::warn!("quartet not found, using seqkit (no visualization)");
        let stats = workdir.join("seqkit_stats.tsv");
        let gaps = workdir.join("gap_content.tsv");
        let genome = s.genome_arg();
        let seqkit = ToolRequest::bioconda("seqkit");
        let steps = vec![
            Step::resolved(seqkit.clone(), ["seqkit", "stats", "-a", "-T", genome.as_str()])
                .capture(&stats),
            Step::resolved(seqkit, ["seqkit", "fx2tab", "-n", "-g", genome.as_str()])
                .capture(&gaps)
                .optional(),
        ];
        StagePlan::Run(
            StageWork::new("seqkit", steps)
                .detail("stats_file", path_arg(&stats))
                .detail("gap_file", path_arg(&gaps))
                .detail("note", "No visualization available without quartet"),
        )
    }
}

// BUSCO ////////////

/// Completeness against one lineage database.
pub struct Busco {
    settings: StageSettings,
    /// as given on the command line
    db: String,
    /// directory holding `db`, when it names a local database
    local_parent: Option<PathBuf>,
    /// lineage name, used in keys and output names
    db_name: String,
}

impl Busco {
    pub fn new(settings: StageSettings, db: &str) -> Self {
        let path = Path::new(db);
        let path = path.canonicalize().unwrap_or_else(|_| path.to_path_buf());
        let (local_parent, db_name) = match (path.exists(), path.file_name()) {
            (true, Some(name)) => (
                Some(path.parent().map(Path::to_path_buf).unwrap_or_default()),
                name.to_string_lossy().into_owned(),
            ),
            _ => (None, db.to_owned()),
        };
        Self {
            settings,
            db: db.to_owned(),
            local_parent,
            db_name,
        }
    }
}

impl Stage for Busco {
    fn key(&self) -> String {
        format!("busco_{}", self.db_name)
    }

    fn title(&self) -> String {
        format!("BUSCO COMPLETENESS ASSESSMENT ({})", self.db_name)
    }

    fn job_name(&self) -> String {
        format!("BUSCO_{}", self.db_name)
    }

    fn dir_name(&self) -> &str {
        "busco"
    }

    fn plan(&self, _probe: &ToolProbe<'_>, workdir: &Path) -> StagePlan {
        let s = &self.settings;
        let output_name = format!("busco_{}", self.db_name);
        let mut args = vec![
            "busco".to_owned(),
            "-i".to_owned(),
            s.genome_arg(),
            "-o".to_owned(),
            output_name.clone(),
            "-m".to_owned(),
            "genome".to_owned(),
            "-c".to_owned(),
            s.threads.to_string(),
            "-l".to_owned(),
            self.db_name.clone(),
        ];
        if let Some(parent) = &self.local_parent {
            args.extend(["--download_path".to_owned(), path_arg(parent), "--offline".to_owned()]);
        } else if self.db == "auto" || self.db == "auto-lineage" {
            args.push("--auto-lineage".to_owned());
        }

        let step = Step::resolved(ToolRequest::bioconda("busco"), args);
        StagePlan::Run(
            StageWork::new("busco", vec![step])
                .with_env_hint("busco")
                .detail("database", self.db_name.clone())
                .detail("output_dir", path_arg(&workdir.join(output_name))),
        )
    }
}

// MERQURY ////////////

/// QV estimation. Needs a k-mer database built from reads, which we never have.
pub struct Merqury;

impl Stage for Merqury {
    fn key(&self) -> String {
        "merqury".to_owned()
    }

    fn title(&self) -> String {
        "MERQURY QV CALCULATION".to_owned()
    }

    fn job_name(&self) -> String {
        "MERQURY".to_owned()
    }

    fn dir_name(&self) -> &str {
        "merqury"
    }

    fn plan(&self, _probe: &ToolProbe<'_>, _workdir: &Path) -> StagePlan {
        StagePlan::Skip("Requires raw sequencing reads for k-mer database generation".to_owned())
    }
}

// LTR ////////////

/// LTR retrotransposon candidates and the LTR Assembly Index.
pub struct Ltr(StageSettings);

impl Stage for Ltr {
    fn key(&self) -> String {
        "ltr_analysis".to_owned()
    }

    fn title(&self) -> String {
        "LTR ANALYSIS AND LAI".to_owned()
    }

    fn job_name(&self) -> String {
        "LTR_ANALYSIS".to_owned()
    }

    fn dir_name(&self) -> &str {
        "ltr_analysis"
    }

    fn plan(&self, _probe: &ToolProbe<'_>, workdir: &Path) -> StagePlan {
        let s = &self.0;
        let name = s.genome_name();
        let stem = s.genome_stem();

        let harvest = workdir.join(format!("{stem}.harvest.scn"));
        let raw = workdir.join(format!("{name}.rawLTR.scn"));
        let pass_list = workdir.join(format!("{name}.pass.list"));
        let out_file = workdir.join(format!("{name}.out"));
        let finder_outputs = [
            workdir.join(format!("{name}.finder.combine.scn")),
            workdir.join(format!("{stem}.finder.combine.scn")),
        ];

        let (genome, threads) = (s.genome_arg(), s.threads.to_string());
        let (genome, threads) = (genome.as_str(), threads.as_str());
        let index = path_arg(&workdir.join(&stem));
        let index = index.as_str();
        let raw_arg = path_arg(&raw);
        let raw_arg = raw_arg.as_str();
        let (pass_arg, out_arg) = (path_arg(&pass_list), path_arg(&out_file));
        let (pass_arg, out_arg) = (pass_arg.as_str(), out_arg.as_str());
        let combine = combine_script(&harvest, &finder_outputs, &raw);

        let gt = ToolRequest::bioconda("genometools");
        let mut steps = Vec::with_capacity(6);
        steps.push(Step::resolved(
            gt.clone(),
            [
                "gt", "suffixerator", "-db", genome, "-indexname", index, "-tis", "-suf", "-lcp",
                "-des", "-ssp", "-sds", "-dna",
            ],
        ));
        steps.push(
            Step::resolved(
                gt,
                [
                    "gt", "-j", threads, "ltrharvest", "-index", index, "-minlenltr", "100",
                    "-maxlenltr", "7000", "-mintsd", "4", "-maxtsd", "6", "-motif", "TGCA",
                    "-motifmis", "1", "-similar", "85", "-vic", "10", "-seed", "20", "-seqids",
                    "yes",
                ],
            )
            .capture(&harvest),
        );
        steps.push(
            Step::resolved(
                ToolRequest::bioconda("ltr_finder"),
                [
                    "LTR_FINDER_parallel", "-seq", genome, "-threads", threads, "-harvest_out",
                    "-size", "1000000",
                ],
            )
            .optional(),
        );
        steps.push(Step::direct(["bash", "-c", combine.as_str()]));
        steps.push(
            Step::resolved(
                ToolRequest::bioconda("ltr_retriever"),
                [
                    "LTR_retriever", "-genome", genome, "-inharvest", raw_arg, "-threads", threads,
                ],
            )
            .optional(),
        );
        steps.push(
            Step::direct([
                "LAI", "-genome", genome, "-intact", pass_arg, "-all", out_arg, "-t", threads,
            ])
            .optional()
            .only_if_exists([pass_list, out_file]),
        );

        StagePlan::Run(
            StageWork::new("genometools", steps)
                .detail("ltrharvest_output", path_arg(&harvest))
                .detail("combined_ltr", path_arg(&raw))
                .detail("ltr_retriever_dir", path_arg(workdir)),
        )
    }
}

/// Concatenate ltrharvest's candidates with whichever LTR_FINDER output exists.
fn combine_script(harvest: &Path, finder_outputs: &[PathBuf], raw: &Path) -> String {
    let raw = util::shell_quote(&path_arg(raw));
    let mut script = format!("cat {} > {raw}", util::shell_quote(&path_arg(harvest)));
    for finder in finder_outputs {
        let finder = util::shell_quote(&path_arg(finder));
        script.push_str(&format!("; if [ -f {finder} ]; then cat {finder} >> {raw}; fi"));
    }
    script
}

// QUAST ////////////

/// Contiguity statistics (N50 and friends).
pub struct Quast(StageSettings);

impl Stage for Quast {
    fn key(&self) -> String {
        "quast".to_owned()
    }

    fn title(&self) -> String {
        "QUAST ASSEMBLY STATISTICS".to_owned()
    }

    fn job_name(&self) -> String {
        "QUAST".to_owned()
    }

    fn dir_name(&self) -> &str {
        "quast"
    }

    fn plan(&self, _probe: &ToolProbe<'_>, workdir: &Path) -> StagePlan {
        let s = &self.0;
        let mut args = vec![
            "quast.py".to_owned(),
            s.genome_arg(),
            "-o".to_owned(),
            path_arg(workdir),
            "-t".to_owned(),
            s.threads.to_string(),
            "--min-contig".to_owned(),
            "0".to_owned(),
            "--plots-format".to_owned(),
            "png".to_owned(),
            "--large".to_owned(),
        ];
        if let Some(reference) = &s.reference {
            args.extend(["-r".to_owned(), path_arg(reference)]);
        }
        let step = Step::resolved(ToolRequest::bioconda("quast"), args);
        StagePlan::Run(
            StageWork::new("quast", vec![step])
                .with_env_hint("quast")
                .detail("report", path_arg(&workdir.join("report.txt"))),
        )
    }
}

// SYNTENY ////////////

/// GenomeSyn plot against the reference, when there is one.
pub struct Synteny(StageSettings);

impl Stage for Synteny {
    fn key(&self) -> String {
        "synteny".to_owned()
    }

    fn title(&self) -> String {
        "SYNTENY ANALYSIS".to_owned()
    }

    fn job_name(&self) -> String {
        "SYNTENY".to_owned()
    }

    fn dir_name(&self) -> &str {
        "synteny"
    }

    fn plan(&self, probe: &ToolProbe<'_>, workdir: &Path) -> StagePlan {
        let s = &self.0;
        let Some(reference) = &s.reference else {
            return StagePlan::Skip("No reference genome provided".to_owned());
        };
        if !probe.available("GenomeSyn", &["--help"]) {
            log::warn!("GenomeSyn not found but reference genome provided");
            return StagePlan::Skip("GenomeSyn not available".to_owned());
        }
        let step = Step::direct([
            "GenomeSyn".to_owned(),
            "-g1".to_owned(),
            path_arg(reference),
            "-g2".to_owned(),
            s.genome_arg(),
            "-o".to_owned(),
            path_arg(workdir),
            "-t".to_owned(),
            s.threads.to_string(),
        ]);
        StagePlan::Run(StageWork::new("GenomeSyn", vec![step]))
    }
}
