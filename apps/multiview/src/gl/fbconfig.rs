use std::os::raw::c_int;

use tracing::{debug, info};
use x11::{glx, xlib};

use crate::core::display::XlibDisplay;
use crate::core::error::SetupError;

/// Hard requirements for every candidate, 0-terminated.
#[rustfmt::skip]
const VISUAL_ATTRIBS: [c_int; 23] = [
    glx::GLX_X_RENDERABLE, 1,
    glx::GLX_DRAWABLE_TYPE, glx::GLX_WINDOW_BIT,
    glx::GLX_RENDER_TYPE, glx::GLX_RGBA_BIT,
    glx::GLX_X_VISUAL_TYPE, glx::GLX_TRUE_COLOR,
    glx::GLX_RED_SIZE, 8,
    glx::GLX_GREEN_SIZE, 8,
    glx::GLX_BLUE_SIZE, 8,
    glx::GLX_ALPHA_SIZE, 8,
    glx::GLX_DEPTH_SIZE, 24,
    glx::GLX_STENCIL_SIZE, 8,
    glx::GLX_DOUBLEBUFFER, 1,
    0,
];

/// What the selector needs to know about one candidate
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CandidateInfo {
    pub has_visual: bool,
    pub sample_buffers: i32,
    pub samples: i32,
}

impl CandidateInfo {
    /// Sample count that counts for ranking; zero without multisample buffers.
    pub fn effective_samples(&self) -> i32 {
        if self.sample_buffers > 0 {
            self.samples
        } else {
            0
        }
    }
}

/// Index of the best candidate.
///
/// Candidates without a visual are skipped. The first usable one is the initial
/// best; a later one wins only with sample buffers and strictly more samples.
pub fn pick_best(candidates: &[CandidateInfo]) -> Option<usize> {
    let mut best: Option<(usize, i32)> = None;

    for (i, candidate) in candidates.iter().enumerate() {
        if !candidate.has_visual {
            continue;
        }
        match best {
            None => best = Some((i, candidate.effective_samples())),
            Some((_, best_samples)) if candidate.sample_buffers > 0 && candidate.samples > best_samples => {
                best = Some((i, candidate.samples));
            }
            Some(_) => {}
        }
    }

    best.map(|(i, _)| i)
}

/// The chosen framebuffer configuration. The rest of the enumeration is released.
#[derive(Debug, Clone, Copy)]
pub struct FramebufferConfig {
    raw: glx::GLXFBConfig,
    pub info: CandidateInfo,
    pub visual_id: xlib::VisualID,
}

impl FramebufferConfig {
    pub fn as_raw(&self) -> glx::GLXFBConfig {
        self.raw
    }
}

/// Visual id of `config`, releasing the visual descriptor before returning.
fn visual_id(display: &XlibDisplay, config: glx::GLXFBConfig) -> Option<xlib::VisualID> {
    unsafe {
        let vi = glx::glXGetVisualFromFBConfig(display.as_ptr(), config);
        if vi.is_null() {
            return None;
        }
        let id = (*vi).visualid;
        xlib::XFree(vi.cast());
        Some(id)
    }
}

fn attrib(display: &XlibDisplay, config: glx::GLXFBConfig, attribute: c_int) -> i32 {
    let mut value: c_int = 0;
    unsafe { glx::glXGetFBConfigAttrib(display.as_ptr(), config, attribute, &mut value) };
    value
}

fn inspect(display: &XlibDisplay, config: glx::GLXFBConfig) -> CandidateInfo {
    CandidateInfo {
        has_visual: visual_id(display, config).is_some(),
        sample_buffers: attrib(display, config, glx::GLX_SAMPLE_BUFFERS),
        samples: attrib(display, config, glx::GLX_SAMPLES),
    }
}

pub fn choose_best_config(display: &XlibDisplay, screen: i32) -> Result<FramebufferConfig, SetupError> {
    let mut count: c_int = 0;
    let list = unsafe { glx::glXChooseFBConfig(display.as_ptr(), screen, VISUAL_ATTRIBS.as_ptr(), &mut count) };
    if list.is_null() {
        return Err(SetupError::NoFramebufferConfig);
    }
    if count <= 0 {
        unsafe { xlib::XFree(list.cast()) };
        return Err(SetupError::NoFramebufferConfig);
    }

    let (chosen, total) = {
        let configs = unsafe { std::slice::from_raw_parts(list, count as usize) };
        let infos: Vec<CandidateInfo> = configs.iter().map(|&c| inspect(display, c)).collect();
        debug!("{} framebuffer configs match, {} with a visual", infos.len(), infos.iter().filter(|i| i.has_visual).count());
        (pick_best(&infos).map(|i| (configs[i], infos[i])), configs.len())
    };
    unsafe { xlib::XFree(list.cast()) };

    let (raw, info) = chosen.ok_or(SetupError::NoVisual)?;
    let visual_id = visual_id(display, raw).ok_or(SetupError::NoVisual)?;

    info!(
        "Chose framebuffer config out of {} candidates (visual {:#x}, sample buffers {}, samples {})",
        total, visual_id, info.sample_buffers, info.samples
    );
    Ok(FramebufferConfig { raw, info, visual_id })
}
