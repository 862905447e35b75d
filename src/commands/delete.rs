use anyhow::{Result, bail};
use tracing::{info, warn};

use crate::cli::{DeleteArgs, resolve_db_path};
use crate::store::ExamStore;

pub fn run(args: DeleteArgs) -> Result<()> {
    let db_path = resolve_db_path(&args.cache_root, args.db_path.as_ref());
    if !db_path.exists() {
        warn!(path = %db_path.display(), "database file missing; nothing to delete");
        return Ok(());
    }

    let mut store = ExamStore::open(&db_path)?;

    let removed = match (args.id, args.name.as_deref()) {
        (Some(id), None) => {
            let removed = store.delete_by_id(id)?;
            info!(id, removed, "delete by id");
            removed
        }
        (None, Some(name)) => {
            let removed = store.delete_by_name(name)?;
            info!(name = %name, removed, "delete by name");
            removed
        }
        _ => bail!("exactly one of --id or --name is required"),
    };

    if removed == 0 {
        info!("no matching exam records; nothing removed");
    }

    Ok(())
}
