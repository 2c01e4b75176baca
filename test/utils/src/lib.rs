use std::fs;
use std::path::Path;

/// Output of `ollama list` as printed by a real install.
pub fn ollama_list_fixture() -> &'static str {
    return r#"
NAME                    ID              SIZE      MODIFIED
llama3:latest           365c0bd3c000    4.7 GB    2 days ago
mistral:7b              61e88e884507    4.1 GB    3 weeks ago

codellama:13b-instruct  9f438cb9cd58    7.4 GB    5 months ago
"#
    .trim_start();
}

/// A shell script that mimics the runner binary. `run <model>` echoes stdin
/// back with surrounding whitespace, `run broken` fails with a diagnostic on
/// stderr, and `run sleepy` hangs.
pub fn fake_runner_script() -> &'static str {
    return r#"
case "$1" in
  list)
    printf 'NAME             ID              SIZE      MODIFIED\n'
    printf 'llama3:latest    365c0bd3c000    4.7 GB    2 days ago\n'
    printf 'mistral:7b       61e88e884507    4.1 GB    3 weeks ago\n'
    ;;
  run)
    if [ "$2" = "broken" ]; then
      echo "Error: pull model manifest: file does not exist" >&2
      exit 1
    fi
    if [ "$2" = "sleepy" ]; then
      exec sleep 5
    fi
    printf '\n  [%s] ' "$2"
    cat
    printf '\n\n'
    ;;
  --version)
    echo "ollama version is 0.0.0"
    ;;
  *)
    exit 2
    ;;
esac
"#
    .trim_start();
}

/// Writes the fake runner script into `dir` and returns a `runner-path` value
/// that executes it through `sh`. The script lives as long as `dir`.
pub fn write_fake_runner(dir: &Path) -> String {
    let path = dir.join("ollama.sh");
    fs::write(&path, fake_runner_script()).unwrap();
    return format!("sh {}", path.to_string_lossy());
}
