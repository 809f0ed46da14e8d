use std::path::Path;

use cardforge_core::storage::{to_data_url, ImagePayload};
use cardforge_core::ContentHash;

use crate::cli::ImageCommands;
use crate::commands::common::open_library;
use crate::error::CliError;

pub async fn run_image(command: ImageCommands, db_path: &Path) -> Result<(), CliError> {
    let library = open_library(db_path).await?;
    match command {
        ImageCommands::Import { path } => {
            let payload = ImagePayload::from_file(&path)?;
            let size = payload.bytes().len();
            let hash = library.import_image(payload).await?;
            println!("{hash}");
            tracing::info!("Stored {} ({} bytes)", path.display(), size);
        }
        ImageCommands::Export { hash, output } => {
            let hash = hash.trim().parse::<ContentHash>()?;
            let image = library
                .image(&hash)
                .await?
                .ok_or_else(|| CliError::ImageNotFound(hash.to_string()))?;
            if let Some(path) = output {
                std::fs::write(&path, &image.bytes)?;
                println!("{}", path.display());
            } else {
                println!("{}", to_data_url(&image));
            }
        }
    }
    Ok(())
}
