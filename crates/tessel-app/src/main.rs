// SPDX-License-Identifier: CEPL-1.0
#![deny(unsafe_op_in_unsafe_fn)]
use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::{fs, io};
use tessel_core::init_tracing;
use tessel_platform::{DesktopWindow, WindowConfig};
use tessel_render::{MeshData, Renderer, TextureData};
use tessel_render_vk::{
    swapchain::wait_for_drawable_extent, ContextOptions, GpuContext, PresentPreference,
    RenderConfig, ShaderSet, SwapchainPrefs, VkRenderer,
};
use tracing::{info, warn};

const CHECKERBOARD_SIZE: u32 = 256;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// TOML config file; missing means defaults
    #[arg(long, default_value = "tessel.toml")]
    config: PathBuf,
    #[arg(long)]
    width: Option<u32>,
    #[arg(long)]
    height: Option<u32>,
    /// PNG used for the quads instead of the checkerboard
    #[arg(long)]
    texture: Option<PathBuf>,
    /// Directory holding mesh.vert.spv and mesh.frag.spv
    #[arg(long)]
    shaders: Option<PathBuf>,
    #[arg(long, value_enum)]
    present_mode: Option<PresentModeCfg>,
    /// Stop after this many presented frames
    #[arg(long)]
    frames: Option<u64>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, ValueEnum)]
#[serde(rename_all = "kebab-case")]
enum PresentModeCfg {
    #[default]
    LowLatency,
    Vsync,
}

impl From<PresentModeCfg> for PresentPreference {
    fn from(mode: PresentModeCfg) -> Self {
        match mode {
            PresentModeCfg::LowLatency => PresentPreference::LowLatency,
            PresentModeCfg::Vsync => PresentPreference::Vsync,
        }
    }
}

#[derive(Debug, Deserialize, Clone, PartialEq)]
#[serde(default)]
struct WindowCfg {
    title: String,
    width: u32,
    height: u32,
}

impl Default for WindowCfg {
    fn default() -> Self {
        let window = WindowConfig::default();
        WindowCfg {
            title: window.title,
            width: window.width,
            height: window.height,
        }
    }
}

#[derive(Debug, Deserialize, Clone, PartialEq)]
#[serde(default)]
struct RenderCfg {
    clear_color: [f32; 4],
    present_mode: PresentModeCfg,
    image_count: Option<u32>,
    /// Unset follows the build profile.
    validation: Option<bool>,
}

impl Default for RenderCfg {
    fn default() -> Self {
        RenderCfg {
            clear_color: RenderConfig::default().clear_color,
            present_mode: PresentModeCfg::default(),
            image_count: None,
            validation: None,
        }
    }
}

#[derive(Debug, Deserialize, Clone, PartialEq)]
#[serde(default)]
struct LogCfg {
    filter: String,
}

impl Default for LogCfg {
    fn default() -> Self {
        LogCfg {
            filter: tessel_core::DEFAULT_LOG_FILTER.into(),
        }
    }
}

#[derive(Debug, Deserialize, Default, Clone, PartialEq)]
#[serde(default)]
struct AppCfg {
    window: WindowCfg,
    render: RenderCfg,
    log: LogCfg,
}

impl AppCfg {
    fn parse(text: &str) -> Result<Self> {
        Ok(toml::from_str(text)?)
    }

    /// Command-line values win over the file.
    fn apply_args(mut self, args: &Args) -> Self {
        if let Some(width) = args.width {
            self.window.width = width;
        }
        if let Some(height) = args.height {
            self.window.height = height;
        }
        if let Some(mode) = args.present_mode {
            self.render.present_mode = mode;
        }
        self
    }

    fn render_config(&self) -> RenderConfig {
        RenderConfig {
            clear_color: self.render.clear_color,
            swapchain: SwapchainPrefs {
                present: self.render.present_mode.into(),
                image_count: self.render.image_count,
            },
        }
    }
}

fn load_cfg(path: &Path) -> Result<AppCfg> {
    match fs::read_to_string(path) {
        Ok(text) => AppCfg::parse(&text).with_context(|| format!("parse {}", path.display())),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(AppCfg::default()),
        Err(e) => Err(e).with_context(|| format!("read {}", path.display())),
    }
}

fn load_texture(path: &Path) -> Result<TextureData> {
    let rgba = image::open(path)
        .with_context(|| format!("decode texture {}", path.display()))?
        .to_rgba8();
    let (width, height) = rgba.dimensions();
    let texture = TextureData::new(width, height, rgba.into_raw())
        .with_context(|| format!("texture {}", path.display()))?;
    info!("texture {} ({width}x{height})", path.display());
    Ok(texture)
}

fn load_shaders(dir: Option<&Path>) -> Result<ShaderSet> {
    match dir {
        Some(dir) => Ok(ShaderSet::load_dir(dir)?),
        None => builtin_shaders(),
    }
}

#[cfg(feature = "embed-shaders")]
fn builtin_shaders() -> Result<ShaderSet> {
    Ok(ShaderSet::embedded()?)
}

#[cfg(not(feature = "embed-shaders"))]
fn builtin_shaders() -> Result<ShaderSet> {
    anyhow::bail!("no shaders built in; pass --shaders <dir> or build with the embed-shaders feature")
}

fn main() -> Result<()> {
    let args = Args::parse();
    let cfg = load_cfg(&args.config)?.apply_args(&args);
    init_tracing(&cfg.log.filter);

    let texture = match &args.texture {
        Some(path) => load_texture(path)?,
        None => TextureData::checkerboard(CHECKERBOARD_SIZE),
    };
    let shaders = load_shaders(args.shaders.as_deref())?;

    let mut window = DesktopWindow::open(&WindowConfig {
        title: cfg.window.title.clone(),
        width: cfg.window.width,
        height: cfg.window.height,
    })?;

    let options = ContextOptions {
        app_name: cfg.window.title.clone(),
        validation: cfg.render.validation.unwrap_or(cfg!(debug_assertions)),
    };
    let gpu = {
        let native = window.window().context("window missing after open")?;
        GpuContext::new(native, native, &options).context("vulkan init")?
    };

    let Some(size) = wait_for_drawable_extent(&mut window) else {
        warn!("window closed before the first frame");
        return Ok(());
    };
    let mut renderer = VkRenderer::new(
        gpu,
        size,
        &MeshData::stacked_quads(),
        &texture,
        shaders,
        cfg.render_config(),
    )
    .context("renderer init")?;

    renderer.run_frame_loop(&mut window, args.frames)?;
    renderer.shutdown()?;
    info!("bye");
    Ok(())
}
