//! Solver profile selection.
//!
//! Maps the request's `mode` string to the executable and extra flag the
//! solver stage will run. Selection is a pure function over the configured
//! solver paths: the profile is computed fresh for every request and handed
//! through the pipeline by value, never stored on shared state.

use std::path::PathBuf;

/// Filesystem locations of the available solver executables.
#[derive(Debug, Clone)]
pub struct SolverPaths {
    /// The 2014 agile-track solver (`siw-then-bfsf`).
    pub agile2014: PathBuf,
    /// The 2018 agile/balanced-track solver (`bfws`).
    pub bfws: PathBuf,
}

/// The executable and optional extra flag selected for one request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SolverProfile {
    pub executable: PathBuf,
    /// Flag name/value appended after the standard arguments, e.g.
    /// `("--DUAL-BFWS", "true")`.
    pub extra_flag: Option<(String, String)>,
}

/// Select the solver profile for a requested mode.
///
/// | mode | executable | extra flag |
/// |---|---|---|
/// | `AGILE2` | agile-2014 | — |
/// | `AGILE` | bfws | `--BFWS-f5 true` |
/// | `BALANCED` | bfws | `--DUAL-BFWS true` |
/// | anything else | bfws | `--DUAL-BFWS true` |
///
/// Unrecognized or absent modes get the balanced default rather than an
/// error, so older clients keep working.
pub fn select_profile(mode: Option<&str>, paths: &SolverPaths) -> SolverProfile {
    match mode {
        Some("AGILE2") => SolverProfile {
            executable: paths.agile2014.clone(),
            extra_flag: None,
        },
        Some("AGILE") => SolverProfile {
            executable: paths.bfws.clone(),
            extra_flag: Some(("--BFWS-f5".to_string(), "true".to_string())),
        },
        _ => SolverProfile {
            executable: paths.bfws.clone(),
            extra_flag: Some(("--DUAL-BFWS".to_string(), "true".to_string())),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_paths() -> SolverPaths {
        SolverPaths {
            agile2014: PathBuf::from("solvers/agile2014/siw-then-bfsf"),
            bfws: PathBuf::from("solvers/agile-balanced2018/bfws"),
        }
    }

    #[test]
    fn agile2_selects_2014_solver_without_flag() {
        let profile = select_profile(Some("AGILE2"), &test_paths());
        assert_eq!(profile.executable, test_paths().agile2014);
        assert!(profile.extra_flag.is_none());
    }

    #[test]
    fn agile_selects_bfws_with_f5_flag() {
        let profile = select_profile(Some("AGILE"), &test_paths());
        assert_eq!(profile.executable, test_paths().bfws);
        assert_eq!(
            profile.extra_flag,
            Some(("--BFWS-f5".to_string(), "true".to_string()))
        );
    }

    #[test]
    fn balanced_selects_bfws_with_dual_flag() {
        let profile = select_profile(Some("BALANCED"), &test_paths());
        assert_eq!(profile.executable, test_paths().bfws);
        assert_eq!(
            profile.extra_flag,
            Some(("--DUAL-BFWS".to_string(), "true".to_string()))
        );
    }

    #[test]
    fn absent_mode_gets_the_default_profile() {
        let profile = select_profile(None, &test_paths());
        assert_eq!(profile, select_profile(Some("BALANCED"), &test_paths()));
    }

    #[test]
    fn unrecognized_mode_gets_the_default_profile() {
        let profile = select_profile(Some("TURBO"), &test_paths());
        assert_eq!(profile, select_profile(None, &test_paths()));
    }

    #[test]
    fn selection_is_deterministic() {
        let paths = test_paths();
        for mode in [Some("AGILE2"), Some("AGILE"), Some("BALANCED"), None] {
            assert_eq!(select_profile(mode, &paths), select_profile(mode, &paths));
        }
    }
}
