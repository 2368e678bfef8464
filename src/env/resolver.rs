use std::time::Duration;

use util::HashMap;

use crate::exec::{CommandLine, Spawner, ToolProbe};

use super::listing::{find_ignore_case, parse_env_list, parse_module_list};
use super::{ExecutionContext, ToolRequest};

/// Host commands used to discover and create environments.
#[derive(Debug, Clone)]
pub struct EnvConfig {
    /// Managed-environment manager executable (e.g. `micromamba`).
    pub manager: String,
    /// Environment-modules command (e.g. `modulecmd`).
    pub module_cmd: String,
    /// Value of `MODULESHOME`, if set; its presence means modules are usable.
    pub modules_home: Option<String>,
    /// Limit for availability checks and listings.
    pub probe_timeout: Duration,
}

impl Default for EnvConfig {
    fn default() -> Self {
        Self {
            manager: "micromamba".to_owned(),
            module_cmd: "modulecmd".to_owned(),
            modules_home: None,
            probe_timeout: Duration::from_secs(60),
        }
    }
}

/// Decides where each tool runs.
///
/// In order: an existing managed environment named after the tool, a module
/// named after the tool, a freshly created managed environment, and finally the
/// bare system `PATH`. Names are compared case-insensitively, and the spelling
/// returned is the one the host reported. Nothing here fails: listings that
/// can't be read count as empty, and every path ends in some context.
pub struct EnvironmentResolver<'a> {
    spawner: &'a dyn Spawner,
    config: EnvConfig,
    manager_available: bool,
    modules_available: bool,
    /// lowercased tool name -> context already handed out this run
    resolved: HashMap<String, ExecutionContext>,
}

impl<'a> EnvironmentResolver<'a> {
    /// Create a resolver, checking once which backends the host has.
    pub fn new(spawner: &'a dyn Spawner, config: EnvConfig) -> Self {
        let probe = ToolProbe::new(spawner, config.probe_timeout);
        let manager_available = probe.available(&config.manager, &["--version"]);
        let modules_available = probe.available(&config.module_cmd, &["python", "list"])
            || config.modules_home.is_some();
        log::debug!(
            "environment backends: {} {}, modules {}",
            config.manager,
            if manager_available { "available" } else { "missing" },
            if modules_available { "available" } else { "missing" },
        );
        Self {
            spawner,
            config,
            manager_available,
            modules_available,
            resolved: HashMap::default(),
        }
    }

    /// The environment manager's executable, used to launch `Managed` contexts.
    pub fn manager(&self) -> &str {
        &self.config.manager
    }

    pub fn manager_available(&self) -> bool {
        self.manager_available
    }

    pub fn resolve(&mut self, req: &ToolRequest) -> ExecutionContext {
        let key = req.tool.to_lowercase();
        if let Some(ctx) = self.resolved.get(&key) {
            return match ctx {
                // nothing was found on the host, so keep the caller's spelling
                ExecutionContext::System(_) => ExecutionContext::System(req.tool.clone()),
                found => found.clone(),
            };
        }
        let ctx = self.resolve_uncached(req);
        self.resolved.insert(key, ctx.clone());
        ctx
    }

    fn resolve_uncached(&self, req: &ToolRequest) -> ExecutionContext {
        let envs = self.list_envs();
        if let Some(env) = find_ignore_case(&req.tool, &envs) {
            log::info!("Using existing {} environment: {env}", self.config.manager);
            return ExecutionContext::Managed(env.to_owned());
        }

        let modules = self.list_modules();
        if let Some(module) = find_ignore_case(&req.tool, &modules) {
            log::info!("Using module: {module}");
            return ExecutionContext::Module(module.to_owned());
        }

        if self.manager_available && self.create_env(req) {
            return ExecutionContext::Managed(req.tool.clone());
        }

        log::info!("Using system installation for {}", req.tool);
        ExecutionContext::System(req.tool.clone())
    }

    fn list_envs(&self) -> Vec<String> {
        if !self.manager_available {
            return Vec::new();
        }
        let cmd = CommandLine::new(&self.config.manager).args(["env", "list"]);
        match self.spawner.output(&cmd, Some(self.config.probe_timeout)) {
            Ok(out) if out.success() => parse_env_list(&out.stdout),
            Ok(out) => {
                log::warn!("`{} env list` exited with {:?}", self.config.manager, out.exit_code);
                Vec::new()
            }
            Err(e) => {
                log::warn!("could not list {} environments: {e}", self.config.manager);
                Vec::new()
            }
        }
    }

    /// Loaded and available modules, without duplicates.
    fn list_modules(&self) -> Vec<String> {
        if !self.modules_available {
            return Vec::new();
        }
        let mut modules = Vec::new();
        for subcommand in ["list", "avail"] {
            let cmd = CommandLine::new(&self.config.module_cmd).args(["python", subcommand]);
            match self.spawner.output(&cmd, Some(self.config.probe_timeout)) {
                // module commands print their listings on stderr:
                Ok(out) if out.success() => {
                    let text = format!("{}\n{}", out.stdout, out.stderr);
                    for name in parse_module_list(&text) {
                        if !modules.contains(&name) {
                            modules.push(name);
                        }
                    }
                }
                Ok(out) => log::warn!(
                    "`{} python {subcommand}` exited with {:?}",
                    self.config.module_cmd,
                    out.exit_code
                ),
                Err(e) => log::warn!("could not run module {subcommand}: {e}"),
            }
        }
        modules
    }

    /// `<manager> create -n <tool> -y -c <channel>... <package>`
    fn create_env(&self, req: &ToolRequest) -> bool {
        log::info!("Creating new {} environment: {}", self.config.manager, req.tool);
        let mut cmd = CommandLine::new(&self.config.manager)
            .args(["create", "-n", req.tool.as_str(), "-y"]);
        for channel in &req.channels {
            cmd = cmd.arg("-c").arg(channel);
        }
        cmd = cmd.arg(req.package());

        match self.spawner.output(&cmd, None) {
            Ok(out) if out.success() => {
                log::info!("Successfully created environment: {}", req.tool);
                true
            }
            Ok(out) => {
                log::warn!("Failed to create environment for {}: {}", req.tool, out.stderr.trim());
                false
            }
            Err(e) => {
                log::warn!("Error creating environment for {}: {e}", req.tool);
                false
            }
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::exec::fake::{Reply, ScriptedSpawner};

    const ENV_LIST: &str = "  base      /opt/mm\n  BUSCO     /opt/mm/envs/BUSCO\n";

    fn config() -> EnvConfig {
        EnvConfig {
            probe_timeout: Duration::from_secs(1),
            ..EnvConfig::default()
        }
    }

    fn with_manager() -> ScriptedSpawner {
        let spawner = ScriptedSpawner::new();
        spawner
            .on("micromamba", &["--version"], Reply::ok("1.5.8"))
            .on("micromamba", &["env", "list"], Reply::ok(ENV_LIST));
        spawner
    }

    #[test]
    fn test_existing_env_keeps_registry_case() {
        let spawner = with_manager();
        let mut resolver = EnvironmentResolver::new(&spawner, config());
        let ctx = resolver.resolve(&ToolRequest::bioconda("busco"));
        assert_eq!(ctx, ExecutionContext::Managed("BUSCO".to_owned()));
    }

    #[test]
    fn test_module_before_creation() {
        let spawner = with_manager();
        spawner
            .on("modulecmd", &["python", "list"], Reply::ok(""))
            .on(
                "modulecmd",
                &["python", "avail"],
                Reply::Exit(crate::exec::RunOutput {
                    exit_code: Some(0),
                    stdout: String::new(),
                    stderr: "---- /mods ----\nQuast/5.2.0\n".to_owned(),
                    not_found: false,
                }),
            );
        let mut resolver = EnvironmentResolver::new(&spawner, config());
        let ctx = resolver.resolve(&ToolRequest::bioconda("quast"));
        assert_eq!(ctx, ExecutionContext::Module("Quast".to_owned()));
        let created = spawner
            .calls()
            .iter()
            .any(|c| c.args.first().map(String::as_str) == Some("create"));
        assert!(!created);
    }

    #[test]
    fn test_creates_env_with_channels_in_order() {
        let spawner = with_manager();
        spawner.on("micromamba", &["create"], Reply::ok(""));
        let mut resolver = EnvironmentResolver::new(&spawner, config());
        let req = ToolRequest::bioconda("gt").with_package("genometools");
        assert_eq!(resolver.resolve(&req), ExecutionContext::Managed("gt".to_owned()));

        let create = spawner
            .calls()
            .into_iter()
            .find(|c| c.args.first().map(String::as_str) == Some("create"))
            .unwrap();
        assert_eq!(
            create.args,
            ["create", "-n", "gt", "-y", "-c", "bioconda", "-c", "conda-forge", "genometools"]
        );
    }

    #[test]
    fn test_failed_creation_falls_back_to_system() {
        let spawner = with_manager();
        spawner.on("micromamba", &["create"], Reply::fail(1, "solver error"));
        let mut resolver = EnvironmentResolver::new(&spawner, config());
        let ctx = resolver.resolve(&ToolRequest::bioconda("ltr_finder"));
        assert_eq!(ctx, ExecutionContext::System("ltr_finder".to_owned()));
    }

    #[test]
    fn test_no_backends_gives_system() {
        let spawner = ScriptedSpawner::new();
        let mut resolver = EnvironmentResolver::new(&spawner, config());
        assert!(!resolver.manager_available());
        for tool in ["seqkit", "QUAST", "busco"] {
            let ctx = resolver.resolve(&ToolRequest::new(tool));
            assert_eq!(ctx, ExecutionContext::System(tool.to_owned()));
        }
        // nothing but the two availability probes was attempted:
        assert_eq!(spawner.calls().len(), 2);
    }

    #[test]
    fn test_listing_failure_counts_as_empty() {
        let spawner = ScriptedSpawner::new();
        spawner
            .on("micromamba", &["--version"], Reply::ok("1.5.8"))
            .on("micromamba", &["env", "list"], Reply::fail(1, "corrupt"))
            .on("micromamba", &["create"], Reply::ok(""));
        let mut resolver = EnvironmentResolver::new(&spawner, config());
        let ctx = resolver.resolve(&ToolRequest::new("busco"));
        assert_eq!(ctx, ExecutionContext::Managed("busco".to_owned()));
    }

    #[test]
    fn test_modules_home_enables_modules() {
        let spawner = ScriptedSpawner::new();
        spawner.on("modulecmd", &["python", "avail"], Reply::ok("seqkit/2.5\n"));
        let cfg = EnvConfig {
            modules_home: Some("/usr/share/Modules".to_owned()),
            ..config()
        };
        let mut resolver = EnvironmentResolver::new(&spawner, cfg);
        let ctx = resolver.resolve(&ToolRequest::new("SeqKit"));
        assert_eq!(ctx, ExecutionContext::Module("seqkit".to_owned()));
    }

    #[test]
    fn test_resolution_is_memoized() {
        let spawner = with_manager();
        let mut resolver = EnvironmentResolver::new(&spawner, config());
        resolver.resolve(&ToolRequest::new("busco"));
        let before = spawner.calls().len();
        resolver.resolve(&ToolRequest::new("BUSCO"));
        assert_eq!(spawner.calls().len(), before);
    }

    #[test]
    fn test_memoized_system_keeps_requested_name() {
        let spawner = ScriptedSpawner::new();
        let mut resolver = EnvironmentResolver::new(&spawner, config());
        let first = resolver.resolve(&ToolRequest::new("busco"));
        let before = spawner.calls().len();
        let second = resolver.resolve(&ToolRequest::new("BUSCO"));
        assert_eq!(first, ExecutionContext::System("busco".to_owned()));
        assert_eq!(second, ExecutionContext::System("BUSCO".to_owned()));
        assert_eq!(spawner.calls().len(), before);
    }
}
