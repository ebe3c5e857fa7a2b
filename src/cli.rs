use clap::Parser;

use crate::zip::{ErrorPolicy, ExtractOptions, OverwritePolicy};

#[derive(Parser, Debug)]
#[command(name = "pkextract")]
#[command(version)]
#[command(about = "A ZIP extractor with DEFLATE, WinZip AES and HTTP support", long_about = None)]
#[command(after_help = "Examples:\n  \
  pkextract data1.zip -x joe          extract all files except joe from data1.zip\n  \
  pkextract -p foo.zip | more         send contents of foo.zip via pipe into more\n  \
  pkextract -P secret -d out s.zip    extract an AES encrypted archive into out/\n  \
  pkextract -l https://example.com/archive.zip   list files from remote ZIP")]
pub struct Cli {
    /// ZIP file path or HTTP URL
    #[arg(value_name = "FILE")]
    pub file: String,

    /// Files to extract (default: all)
    #[arg(value_name = "FILES")]
    pub files: Vec<String>,

    /// List files (short format)
    #[arg(short = 'l')]
    pub list: bool,

    /// List verbosely/show version info
    #[arg(short = 'v')]
    pub verbose: bool,

    /// Extract files to pipe, no messages
    #[arg(short = 'p')]
    pub pipe: bool,

    /// Extract files into exdir
    #[arg(short = 'd', value_name = "DIR")]
    pub extract_dir: Option<String>,

    /// Exclude files that follow
    #[arg(short = 'x', value_name = "FILE", num_args = 1..)]
    pub exclude: Vec<String>,

    /// Never overwrite existing files
    #[arg(short = 'n')]
    pub never_overwrite: bool,

    /// Overwrite files WITHOUT prompting
    #[arg(short = 'o')]
    pub overwrite: bool,

    /// Junk paths (do not make directories)
    #[arg(short = 'j')]
    pub junk_paths: bool,

    /// Password for WinZip AES encrypted entries
    #[arg(short = 'P', value_name = "PASSWORD")]
    pub password: Option<String>,

    /// Number of entries extracted in parallel (default: CPU count)
    #[arg(short = 'J', long = "jobs", value_name = "N")]
    pub jobs: Option<usize>,

    /// Keep extracting after an entry fails, report failures at the end
    #[arg(short = 'k', long = "keep-going")]
    pub keep_going: bool,

    /// Quiet mode (-qq => quieter)
    #[arg(short = 'q', action = clap::ArgAction::Count)]
    pub quiet: u8,
}

impl Cli {
    pub fn is_http_url(&self) -> bool {
        self.file.starts_with("http://") || self.file.starts_with("https://")
    }

    pub fn is_quiet(&self) -> bool {
        self.quiet > 0 || self.pipe
    }

    pub fn is_very_quiet(&self) -> bool {
        self.quiet > 1
    }

    /// Output directory, the current one unless `-d` was given.
    pub fn output_root(&self) -> &str {
        self.extract_dir.as_deref().unwrap_or(".")
    }

    /// Library options matching these flags.
    ///
    /// Existing files are only replaced under `-o`; without it they are
    /// skipped, as with `-n`.
    pub fn extract_options(&self) -> ExtractOptions {
        let mut options = ExtractOptions::default()
            .junk_paths(self.junk_paths)
            .overwrite(if self.overwrite && !self.never_overwrite {
                OverwritePolicy::Always
            } else {
                OverwritePolicy::Never
            })
            .error_policy(if self.keep_going {
                ErrorPolicy::Continue
            } else {
                ErrorPolicy::Abort
            });

        if let Some(password) = &self.password {
            options = options.password(password.as_bytes());
        }
        if let Some(jobs) = self.jobs {
            options = options.jobs(jobs);
        }
        options
    }

    /// Whether an archive entry passes the `FILES` and `-x` filters.
    pub fn selects(&self, name: &str) -> bool {
        // If specific files are requested via positional arguments,
        // only include entries that match
        if !self.files.is_empty() {
            let matches = self.files.iter().any(|f| {
                if has_glob_chars(f) {
                    // Pattern contains wildcards: use glob matching
                    glob_match(f, name)
                } else {
                    // No wildcards: exact match on filename or full path
                    let basename = name
                        .trim_end_matches('/')
                        .rsplit('/')
                        .next()
                        .unwrap_or(name);
                    name == f || basename == f
                }
            });
            if !matches {
                return false;
            }
        }

        // Exclude files matching the -x patterns
        !self
            .exclude
            .iter()
            .any(|x| name.contains(x.as_str()) || glob_match(x, name))
    }
}

/// Check if a pattern contains glob wildcard characters.
fn has_glob_chars(pattern: &str) -> bool {
    pattern.contains('*') || pattern.contains('?')
}

/// Simple glob pattern matching supporting `*` and `?` wildcards.
///
/// - `*` matches zero or more characters
/// - `?` matches exactly one character
pub fn glob_match(pattern: &str, text: &str) -> bool {
    let pattern_chars: Vec<char> = pattern.chars().collect();
    let text_chars: Vec<char> = text.chars().collect();

    fn do_match(pattern: &[char], text: &[char]) -> bool {
        match (pattern.first(), text.first()) {
            (None, None) => true,
            // Try matching zero characters (skip the star)
            // OR matching one character (keep the star for more)
            (Some('*'), _) => {
                do_match(&pattern[1..], text) || (!text.is_empty() && do_match(pattern, &text[1..]))
            }
            (Some('?'), Some(_)) => do_match(&pattern[1..], &text[1..]),
            (Some(p), Some(t)) if *p == *t => do_match(&pattern[1..], &text[1..]),
            _ => false,
        }
    }

    do_match(&pattern_chars, &text_chars)
}
