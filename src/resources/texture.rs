use std::path::PathBuf;

use anyhow::Context as _;

use crate::data_structures::texture;

/// Environment variable overriding the asset directory (`./assets` by default).
pub const ASSET_ROOT_ENV: &str = "ENJON_ASSETS";

pub fn asset_path(file_name: &str) -> PathBuf {
    let root = std::env::var_os(ASSET_ROOT_ENV)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("./assets"));
    root.join(file_name)
}

pub async fn load_string(file_name: &str) -> anyhow::Result<String> {
    let path = asset_path(file_name);
    tokio::fs::read_to_string(&path)
        .await
        .with_context(|| format!("cannot read {}", path.display()))
}

pub async fn load_binary(file_name: &str) -> anyhow::Result<Vec<u8>> {
    let path = asset_path(file_name);
    tokio::fs::read(&path)
        .await
        .with_context(|| format!("cannot read {}", path.display()))
}

pub async fn load_texture(
    file_name: &str,
    is_normal_map: bool,
    device: &wgpu::Device,
    queue: &wgpu::Queue,
    format: Option<&str>,
) -> anyhow::Result<texture::Texture> {
    let data = load_binary(file_name).await?;
    texture::Texture::from_bytes(device, queue, &data, file_name, format, is_normal_map)
}
