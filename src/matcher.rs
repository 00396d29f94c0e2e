//! Matching of live processes against configured watch rules.

use std::path::Path;

use crate::config::WatchRule;

/// Returns the index of the first rule matching `argv`, or `None`.
///
/// Two passes over the rules in declaration order: first by exact token
/// (full path match), then by path basename. Any exact match outranks any
/// basename match, even one declared earlier, so a configuration can pin a
/// specific binary by absolute path while another rule catches the short
/// name.
pub fn match_rules(rules: &[WatchRule], argv: &[String]) -> Option<usize> {
    for (i, rule) in rules.iter().enumerate() {
        if let Some(token) = argv.get(rule.argv_index) {
            if *token == rule.name {
                return Some(i);
            }
        }
    }
    for (i, rule) in rules.iter().enumerate() {
        if let Some(token) = argv.get(rule.argv_index) {
            let basename = Path::new(token).file_name().and_then(|s| s.to_str());
            if basename == Some(rule.name.as_str()) {
                return Some(i);
            }
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::WatchConfig;

    fn rules(src: &str) -> Vec<WatchRule> {
        WatchConfig::parse(src).unwrap().rules
    }

    fn argv(tokens: &[&str]) -> Vec<String> {
        tokens.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_exact_match_on_argv0() {
        let rules = rules("[/usr/sbin/smbd]\nCPU=1\n");
        assert_eq!(match_rules(&rules, &argv(&["/usr/sbin/smbd"])), Some(0));
    }

    #[test]
    fn test_basename_match() {
        let rules = rules("[smbd]\nCPU=1\n");
        assert_eq!(match_rules(&rules, &argv(&["/usr/sbin/smbd", "-D"])), Some(0));
    }

    #[test]
    fn test_no_match() {
        let rules = rules("[smbd]\nCPU=1\n");
        assert_eq!(match_rules(&rules, &argv(&["/usr/sbin/nmbd"])), None);
    }

    #[test]
    fn test_exact_match_beats_earlier_basename_match() {
        // Rule 0 would match by basename, rule 1 matches verbatim. The exact
        // pass runs first across ALL rules, so rule 1 wins.
        let rules = rules("[backup]\nCPU=1\n[/opt/tools/backup]\nCPU=2\n");
        assert_eq!(match_rules(&rules, &argv(&["/opt/tools/backup"])), Some(1));
    }

    #[test]
    fn test_first_rule_wins_within_a_pass() {
        let rules = rules("[worker]\nCPU=1\n[worker2]\nCPU=2\n");
        assert_eq!(match_rules(&rules, &argv(&["/usr/bin/worker"])), Some(0));
    }

    #[test]
    fn test_argv_index_selects_token() {
        // Interpreter-launched service: match on argv[1].
        let rules = rules("[/srv/app/main.py]\nARGV=1\nCPU=1\n");
        assert_eq!(
            match_rules(&rules, &argv(&["/usr/bin/python3", "/srv/app/main.py"])),
            Some(0)
        );
    }

    #[test]
    fn test_argv_index_out_of_range_never_matches() {
        let rules = rules("[app]\nARGV=3\nCPU=1\n");
        assert_eq!(match_rules(&rules, &argv(&["app"])), None);
    }

    #[test]
    fn test_basename_match_on_higher_argv_index() {
        let rules = rules("[main.py]\nARGV=1\nCPU=1\n");
        assert_eq!(
            match_rules(&rules, &argv(&["/usr/bin/python3", "/srv/app/main.py"])),
            Some(0)
        );
    }

    #[test]
    fn test_empty_argv_never_matches() {
        let rules = rules("[app]\nCPU=1\n");
        assert_eq!(match_rules(&rules, &[]), None);
    }

    #[test]
    fn test_matching_is_deterministic() {
        let rules = rules("[a]\nCPU=1\n[b]\nCPU=1\n");
        let av = argv(&["/bin/b", "x"]);
        let first = match_rules(&rules, &av);
        assert_eq!(first, match_rules(&rules, &av));
        assert_eq!(first, Some(1));
    }
}
