/// Names of managed environments from `<manager> env list` output:
/// the first column of every line that isn't blank, a comment, a header or a rule.
pub fn parse_env_list(text: &str) -> Vec<String> {
    let mut envs = Vec::new();
    for line in text.lines() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let Some(first) = line.split_whitespace().next() else {
            continue;
        };
        if is_rule(first) || first == "Name" {
            continue;
        }
        envs.push(first.to_owned());
    }
    envs
}

/// Module names from `module list`/`module avail` output, version suffix removed:
/// `busco/5.4.7` gives `busco`. Every column is scanned; `1)` style indexes
/// and `(default)` style markers are ignored.
pub fn parse_module_list(text: &str) -> Vec<String> {
    let mut modules = Vec::new();
    for line in text.lines() {
        if line.starts_with('-') || line.trim_end().ends_with(':') {
            continue;
        }
        for token in line.split_whitespace() {
            if is_list_index(token) || is_marker(token) || token.ends_with(':') {
                continue;
            }
            let name = token.split('/').next().unwrap_or(token);
            if !name.is_empty() && !modules.iter().any(|m| m == name) {
                modules.push(name.to_owned());
            }
        }
    }
    modules
}

fn is_list_index(token: &str) -> bool {
    token
        .strip_suffix(')')
        .is_some_and(|n| !n.is_empty() && n.bytes().all(|b| b.is_ascii_digit()))
}

fn is_marker(token: &str) -> bool {
    token.starts_with('(') && token.ends_with(')')
}

fn is_rule(token: &str) -> bool {
    token.chars().all(|c| c == '-' || c == '─' || c == '=')
}

/// Case-insensitive lookup that returns the candidate's own spelling.
pub fn find_ignore_case<'a>(name: &str, candidates: &'a [String]) -> Option<&'a str> {
    candidates
        .iter()
        .find(|c| c.eq_ignore_ascii_case(name))
        .map(String::as_str)
}

#[cfg(test)]
mod test {
    use super::*;
    #[test]
    fn test_env_list() {
        let text = "\
  Name          Active  Path
──────────────────────────────────────────────
  base                  /opt/micromamba
  BUSCO         *       /opt/micromamba/envs/BUSCO
# conda environments:
  quast                 /opt/micromamba/envs/quast

";
        assert_eq!(parse_env_list(text), ["base", "BUSCO", "quast"]);
    }
    #[test]
    fn test_module_list() {
        let text = "\
------------------ /usr/share/modulefiles ------------------
busco/5.4.7   quast/5.2.0
Currently Loaded Modulefiles:
SeqKit/2.5
busco/5.5.0
";
        assert_eq!(parse_module_list(text), ["busco", "quast", "SeqKit"]);
    }
    #[test]
    fn test_module_list_columns_and_indexes() {
        let avail = "\
------------------ /usr/share/modulefiles ------------------
busco/5.4.7   quast/5.2.0(default)   seqkit/2.5
genometools/1.6.2 (L)   LTR_retriever/2.9.0
";
        assert_eq!(
            parse_module_list(avail),
            ["busco", "quast", "seqkit", "genometools", "LTR_retriever"]
        );

        let list = "\
Currently Loaded Modulefiles:
  1) busco/5.4.7   2) quast/5.2.0
";
        assert_eq!(parse_module_list(list), ["busco", "quast"]);
    }
    #[test]
    fn test_find_ignore_case_keeps_registry_spelling() {
        let envs = vec!["base".to_owned(), "BUSCO".to_owned()];
        assert_eq!(find_ignore_case("busco", &envs), Some("BUSCO"));
        assert_eq!(find_ignore_case("quast", &envs), None);
    }
}
