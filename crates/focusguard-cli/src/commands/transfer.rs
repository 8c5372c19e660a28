use std::path::PathBuf;

use crate::common::{close, open_engine, print_json, CliResult};

pub async fn export(output: Option<PathBuf>) -> CliResult {
    let manager = open_engine().await?;
    let file = manager.export();
    close(&manager);

    let json = serde_json::to_string_pretty(&file?)?;
    match output {
        Some(path) => {
            std::fs::write(&path, json)?;
            eprintln!("exported to {}", path.display());
        }
        None => println!("{json}"),
    }
    Ok(())
}

pub async fn import(file: PathBuf) -> CliResult {
    let text = std::fs::read_to_string(&file)?;
    let manager = open_engine().await?;
    let summary = manager.import(&text).await;
    close(&manager);
    print_json(&summary?)
}
