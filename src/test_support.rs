// Fixtures standing in for the database tools. Scripts are run as
// `sh <script> <args>` so no executable bit is needed, and each script
// touches `<script>.ran` so tests can tell whether it was spawned.
use anyhow::Result;
use flate2::read::GzDecoder;
use std::fs::{self, File};
use std::path::{Path, PathBuf};

use crate::config::ExternalTool;

const FAKE_DUMP: &str = r#"
touch "$0.ran"
out=""; db=""; include=""; exclude=""
while [ $# -gt 0 ]; do
  case "$1" in
    --out) out="$2"; shift 2 ;;
    --db) db="$2"; shift 2 ;;
    --collection=*) include="$include ${1#--collection=}"; shift ;;
    --excludeCollection=*) exclude="$exclude ${1#--excludeCollection=}"; shift ;;
    *) shift ;;
  esac
done
mkdir -p "$out/$db"
for c in users orders; do
  if [ -n "$include" ]; then
    case " $include " in *" $c "*) ;; *) continue ;; esac
  fi
  case " $exclude " in *" $c "*) continue ;; esac
  echo "{\"collection\":\"$c\"}" > "$out/$db/$c.bson"
  echo "done dumping $db.$c" 1>&2
done
"#;

const FAKE_RESTORE: &str = r#"
touch "$0.ran"
echo "args: $*"
dir=""
while [ $# -gt 0 ]; do
  case "$1" in
    --dir) dir="$2"; shift 2 ;;
    *) shift ;;
  esac
done
for f in "$dir"/*/*.bson; do
  [ -e "$f" ] || continue
  echo "restoring $(basename "$f")"
done
echo "E11000 duplicate key error collection: shop.users index: _id_ dup key: { _id: 1 }" 1>&2
echo "finished restoring"
"#;

const FAILING: &str = r#"
touch "$0.ran"
echo "Failed: connection refused" 1>&2
exit 1
"#;

fn script_tool(dir: &Path, name: &str, body: &str) -> Result<ExternalTool> {
    let path = dir.join(name);
    fs::write(&path, body)?;
    Ok(ExternalTool::new("sh").with_leading_args([path.to_string_lossy().into_owned()]))
}

pub fn fake_dump_tool(dir: &Path) -> Result<ExternalTool> {
    script_tool(dir, "dump.sh", FAKE_DUMP)
}

pub fn fake_restore_tool(dir: &Path) -> Result<ExternalTool> {
    script_tool(dir, "restore.sh", FAKE_RESTORE)
}

pub fn failing_tool(dir: &Path) -> Result<ExternalTool> {
    script_tool(dir, "failing.sh", FAILING)
}

/// Marker left behind by a fixture script that was spawned.
pub fn ran_marker(tool: &ExternalTool) -> PathBuf {
    PathBuf::from(format!("{}.ran", tool.leading_args[0]))
}

/// Entry paths of a `.tar.gz` archive.
pub fn archive_entries(path: &Path) -> Result<Vec<String>> {
    let mut archive = tar::Archive::new(GzDecoder::new(File::open(path)?));
    let mut names = Vec::new();
    for entry in archive.entries()? {
        names.push(entry?.path()?.to_string_lossy().into_owned());
    }
    Ok(names)
}
