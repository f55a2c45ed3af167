//! One-shot subcommands.

use std::path::Path;

use anyhow::{Context, Result, bail};
use gfxs_api::{
    BatchArchive, DroppedFile, FilterStore, ImagePair, RenderBackend, RenderReply, SectionBuffers,
};
use gfxs_kernel::{DropPlan, classify};
use gfxs_pixels::{DisplaySize, ImageSlot, PixelSampler};

/// Read a script file into section buffers.
pub fn read_script(path: &Path) -> Result<SectionBuffers> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("read script '{}'", path.display()))?;
    Ok(SectionBuffers::from_document(&text))
}

/// Read a file as a drop.
pub fn read_drop(path: &Path) -> Result<DroppedFile> {
    let bytes =
        std::fs::read(path).with_context(|| format!("read image '{}'", path.display()))?;
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string());
    Ok(DroppedFile::new(name, None, bytes))
}

pub async fn write_pair(out: &Path, pair: &ImagePair) -> Result<()> {
    tokio::fs::create_dir_all(out)
        .await
        .with_context(|| format!("create output dir '{}'", out.display()))?;
    for (name, bytes) in [("original.png", &pair.original), ("processed.png", &pair.processed)] {
        let path = out.join(name);
        tokio::fs::write(&path, bytes)
            .await
            .with_context(|| format!("write '{}'", path.display()))?;
    }
    tracing::info!("wrote images to {}", out.display());
    Ok(())
}

/// Write a batch archive under `out`, named by the server or else `fallback`.
pub async fn write_archive(out: &Path, archive: &BatchArchive, fallback: &str) -> Result<()> {
    // The name comes from the server; keep only its last component.
    let name = Path::new(&archive.file_name)
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_else(|| fallback.into());
    tokio::fs::create_dir_all(out)
        .await
        .with_context(|| format!("create output dir '{}'", out.display()))?;
    let path = out.join(name);
    tokio::fs::write(&path, &archive.bytes)
        .await
        .with_context(|| format!("write '{}'", path.display()))?;
    println!("{}", path.display());
    Ok(())
}

pub async fn render(backend: &dyn RenderBackend, script: &Path, out: &Path) -> Result<()> {
    let document = read_script(script)?.assemble();
    match backend.render(&document).await.context("render failed")? {
        RenderReply::Updated(pair) => write_pair(out, &pair).await,
        RenderReply::Unchanged => {
            println!("No update from render.");
            Ok(())
        }
    }
}

pub async fn batch(
    backend: &dyn RenderBackend,
    script: &Path,
    images: &[std::path::PathBuf],
    out: &Path,
    archive_name: &str,
) -> Result<()> {
    let document = read_script(script)?.assemble();
    let files = images
        .iter()
        .map(|path| read_drop(path))
        .collect::<Result<Vec<_>>>()?;
    let archive = backend
        .render_batch(&document, &files)
        .await
        .context("batch render failed")?;
    write_archive(out, &archive, archive_name).await
}

pub async fn upload(
    backend: &dyn RenderBackend,
    image: &Path,
    script: &Path,
    out: &Path,
) -> Result<()> {
    let file = match classify(vec![read_drop(image)?]) {
        DropPlan::Single(file) => file,
        _ => bail!("'{}' is not an image", image.display()),
    };
    backend
        .upload_image(&file)
        .await
        .context("upload failed")?;
    render(backend, script, out).await
}

pub async fn filters_list(store: &dyn FilterStore) -> Result<()> {
    for name in store.list().await.context("list filters")? {
        println!("{name}");
    }
    Ok(())
}

pub async fn filters_show(store: &dyn FilterStore, name: &str) -> Result<()> {
    let text = store
        .read(name)
        .await
        .with_context(|| format!("read filter '{name}'"))?;
    print!("{text}");
    Ok(())
}

pub async fn filters_save(store: &dyn FilterStore, name: &str, script: &Path) -> Result<()> {
    let document = read_script(script)?.assemble();
    store
        .write(name, &document)
        .await
        .with_context(|| format!("save filter '{name}'"))?;
    tracing::info!("saved filter {}", name);
    Ok(())
}

pub fn sample(image: &Path, display: Option<DisplaySize>, at: (f64, f64)) -> Result<String> {
    let bytes = std::fs::read(image).with_context(|| format!("read '{}'", image.display()))?;
    let mut sampler = PixelSampler::new();
    sampler
        .capture(ImageSlot::Original, &bytes)
        .with_context(|| format!("decode '{}'", image.display()))?;

    let display = match display {
        Some(display) => display,
        None => {
            let (width, height) = sampler
                .natural_size(ImageSlot::Original)
                .context("image has no size")?;
            DisplaySize::new(width, height)
        }
    };

    match sampler.sample(ImageSlot::Original, at.0, at.1, display) {
        Some(pixel) => Ok(pixel.to_string()),
        None => bail!("({}, {}) is outside the displayed image", at.0, at.1),
    }
}
