/// The descriptive-name flag could not be found in a process's arguments.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum NameNotFound {
    #[error("no flag \"{flag}\" in args {args:?}")]
    MissingFlag { flag: String, args: Vec<String> },
    #[error("no value for flag \"{flag}\" in args {args:?}")]
    MissingValue { flag: String, args: Vec<String> },
}

/// Extracts the descriptive name from a process's argument vector.
///
/// `argv[0]` is skipped. The first token equal to `-<flag>` or `--<flag>` selects the
/// token right after it; `-<flag>=<value>` and `--<flag>=<value>` are accepted as well.
///
/// # Errors
///
/// Returns [`NameNotFound::MissingFlag`] if the flag does not occur and
/// [`NameNotFound::MissingValue`] if it is the last argument or its `=` value is empty.
///
/// # Examples
///
/// ```
/// # use proc_metrics_exporter::process::resolve_descriptive_name;
/// let args = ["prog", "--name", "foo"].map(String::from);
/// assert_eq!(resolve_descriptive_name(&args, "name").unwrap(), "foo");
/// ```
pub fn resolve_descriptive_name(args: &[String], flag: &str) -> Result<String, NameNotFound> {
    let tail = args.get(1..).unwrap_or_default();
    let mut iter = tail.iter();
    while let Some(arg) = iter.next() {
        let Some(rest) = strip_flag_dashes(arg).and_then(|a| a.strip_prefix(flag)) else {
            continue;
        };
        if rest.is_empty() {
            return iter.next().cloned().ok_or_else(|| NameNotFound::MissingValue {
                flag: flag.to_owned(),
                args: tail.to_vec(),
            });
        }
        if let Some(value) = rest.strip_prefix('=') {
            if value.is_empty() {
                return Err(NameNotFound::MissingValue {
                    flag: flag.to_owned(),
                    args: tail.to_vec(),
                });
            }
            return Ok(value.to_owned());
        }
    }

    Err(NameNotFound::MissingFlag {
        flag: flag.to_owned(),
        args: tail.to_vec(),
    })
}

fn strip_flag_dashes(arg: &str) -> Option<&str> {
    arg.strip_prefix("--").or_else(|| arg.strip_prefix('-'))
}
