/// Characters that never need quoting in a POSIX shell word.
const SAFE_CHARS: &str = "-_./:=+,@%";

/// Quote a single argument so that a POSIX shell reads it back as exactly one word.
///
/// Arguments made only of alphanumerics and a few inert punctuation characters
/// are returned unchanged; everything else is wrapped in single quotes, with any
/// embedded single quote written as `'"'"'`.
pub fn shell_quote(arg: &str) -> String {
    if arg.is_empty() {
        "''".to_owned()
    } else if arg
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || SAFE_CHARS.contains(c))
    {
        arg.to_owned()
    } else {
        format!("'{}'", arg.replace('\'', "'\"'\"'"))
    }
}

/// Quote every argument individually, then join them with single spaces.
pub fn shell_join<S: AsRef<str>>(args: &[S]) -> String {
    let mut joined = String::with_capacity(args.iter().map(|a| a.as_ref().len() + 3).sum());
    for (i, arg) in args.iter().enumerate() {
        if i > 0 {
            joined.push(' ');
        }
        joined.push_str(&shell_quote(arg.as_ref()));
    }
    joined
}

#[cfg(test)]
mod test {
    use super::*;
    #[test]
    fn test_plain_words_unquoted() {
        assert_eq!("busco", shell_quote("busco"));
        assert_eq!("/data/genome.fa", shell_quote("/data/genome.fa"));
        assert_eq!("--min-contig", shell_quote("--min-contig"));
    }
    #[test]
    fn test_metacharacters_quoted() {
        assert_eq!("''", shell_quote(""));
        assert_eq!("'my genome.fa'", shell_quote("my genome.fa"));
        assert_eq!("'a;rm -rf /'", shell_quote("a;rm -rf /"));
        assert_eq!("'$HOME'", shell_quote("$HOME"));
        assert_eq!("'it'\"'\"'s'", shell_quote("it's"));
    }
    #[test]
    fn test_join() {
        assert_eq!(
            "seqkit stats -a -T '/tmp/x y.fa'",
            shell_join(&["seqkit", "stats", "-a", "-T", "/tmp/x y.fa"])
        );
        let empty: [&str; 0] = [];
        assert_eq!("", shell_join(&empty));
    }
}
