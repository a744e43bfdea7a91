use std::mem::{offset_of, size_of};

use glow::HasContext;
use multiview_ui::{DrawList, FontAtlas, Vertex};
use tracing::debug;

use crate::render::RenderError;

type GlProgram = <glow::Context as HasContext>::Program;
type GlShader = <glow::Context as HasContext>::Shader;
type GlVertexArray = <glow::Context as HasContext>::VertexArray;
type GlBuffer = <glow::Context as HasContext>::Buffer;
type GlTexture = <glow::Context as HasContext>::Texture;
type GlUniformLocation = <glow::Context as HasContext>::UniformLocation;

const VERTEX_SHADER: &str = r#"#version 330 core
layout(location = 0) in vec2 a_pos;
layout(location = 1) in vec2 a_uv;
layout(location = 2) in vec4 a_color;

uniform vec2 u_screen;

out vec2 v_uv;
out vec4 v_color;

void main() {
    vec2 ndc = vec2(a_pos.x / u_screen.x * 2.0 - 1.0, 1.0 - a_pos.y / u_screen.y * 2.0);
    gl_Position = vec4(ndc, 0.0, 1.0);
    v_uv = a_uv;
    v_color = a_color;
}
"#;

const FRAGMENT_SHADER: &str = r#"#version 330 core
in vec2 v_uv;
in vec4 v_color;

uniform sampler2D u_atlas;

out vec4 frag_color;

void main() {
    float coverage = texture(u_atlas, v_uv).r;
    frag_color = vec4(v_color.rgb, v_color.a * coverage);
}
"#;

/// Program and atlas texture used by every painter.
///
/// Both contexts share one object namespace, so a single copy serves every
/// window whichever context it is activated with.
#[derive(Debug)]
pub struct TextPipeline {
    program: GlProgram,
    atlas: GlTexture,
    u_screen: Option<GlUniformLocation>,
    u_atlas: Option<GlUniformLocation>,
}

unsafe fn compile(gl: &glow::Context, kind: u32, source: &str) -> Result<GlShader, RenderError> {
    let shader = gl.create_shader(kind).map_err(RenderError::Create)?;
    gl.shader_source(shader, source);
    gl.compile_shader(shader);
    if !gl.get_shader_compile_status(shader) {
        let log = gl.get_shader_info_log(shader);
        gl.delete_shader(shader);
        return Err(RenderError::Shader(log));
    }
    Ok(shader)
}

unsafe fn link(gl: &glow::Context) -> Result<GlProgram, RenderError> {
    let vs = compile(gl, glow::VERTEX_SHADER, VERTEX_SHADER)?;
    let fs = match compile(gl, glow::FRAGMENT_SHADER, FRAGMENT_SHADER) {
        Ok(fs) => fs,
        Err(e) => {
            gl.delete_shader(vs);
            return Err(e);
        }
    };

    let program = gl.create_program().map_err(RenderError::Create)?;
    gl.attach_shader(program, vs);
    gl.attach_shader(program, fs);
    gl.link_program(program);

    gl.detach_shader(program, vs);
    gl.detach_shader(program, fs);
    gl.delete_shader(vs);
    gl.delete_shader(fs);

    if !gl.get_program_link_status(program) {
        let log = gl.get_program_info_log(program);
        gl.delete_program(program);
        return Err(RenderError::Shader(log));
    }
    Ok(program)
}

impl TextPipeline {
    /// Link the program and upload the atlas. A context must be active.
    pub fn new(gl: &glow::Context, atlas: &FontAtlas) -> Result<Self, RenderError> {
        unsafe {
            let program = link(gl)?;
            let u_screen = gl.get_uniform_location(program, "u_screen");
            let u_atlas = gl.get_uniform_location(program, "u_atlas");

            let texture = match gl.create_texture() {
                Ok(texture) => texture,
                Err(e) => {
                    gl.delete_program(program);
                    return Err(RenderError::Create(e));
                }
            };
            gl.bind_texture(glow::TEXTURE_2D, Some(texture));
            gl.pixel_store_i32(glow::UNPACK_ALIGNMENT, 1);
            gl.tex_image_2d(
                glow::TEXTURE_2D,
                0,
                glow::R8 as i32,
                atlas.width() as i32,
                atlas.height() as i32,
                0,
                glow::RED,
                glow::UNSIGNED_BYTE,
                glow::PixelUnpackData::Slice(Some(atlas.pixels())),
            );
            gl.tex_parameter_i32(glow::TEXTURE_2D, glow::TEXTURE_MIN_FILTER, glow::LINEAR as i32);
            gl.tex_parameter_i32(glow::TEXTURE_2D, glow::TEXTURE_MAG_FILTER, glow::LINEAR as i32);
            gl.tex_parameter_i32(glow::TEXTURE_2D, glow::TEXTURE_WRAP_S, glow::CLAMP_TO_EDGE as i32);
            gl.tex_parameter_i32(glow::TEXTURE_2D, glow::TEXTURE_WRAP_T, glow::CLAMP_TO_EDGE as i32);
            gl.bind_texture(glow::TEXTURE_2D, None);

            let pipeline = Self { program, atlas: texture, u_screen, u_atlas };
            if let Err(e) = check_error(gl, "pipeline setup") {
                pipeline.destroy(gl);
                return Err(e);
            }
            debug!("Text pipeline ready (atlas {}x{})", atlas.width(), atlas.height());
            Ok(pipeline)
        }
    }

    pub fn destroy(self, gl: &glow::Context) {
        unsafe {
            gl.delete_texture(self.atlas);
            gl.delete_program(self.program);
        }
    }
}

/// One copy of a resource used by many owners: created by the first
/// `acquire`, handed back for deletion by the last `release`.
#[derive(Debug)]
pub struct Shared<T> {
    value: Option<T>,
    users: usize,
}

impl<T> Default for Shared<T> {
    fn default() -> Self {
        Self { value: None, users: 0 }
    }
}

impl<T> Shared<T> {
    pub fn acquire<E>(&mut self, create: impl FnOnce() -> Result<T, E>) -> Result<&T, E> {
        let value = match self.value.take() {
            Some(value) => value,
            None => create()?,
        };
        self.users += 1;
        Ok(self.value.insert(value))
    }

    pub fn get(&self) -> Option<&T> {
        self.value.as_ref()
    }

    /// Drop one user. Returns the resource once nobody uses it.
    pub fn release(&mut self) -> Option<T> {
        self.users = self.users.saturating_sub(1);
        if self.users == 0 {
            self.value.take()
        } else {
            None
        }
    }

    pub fn users(&self) -> usize {
        self.users
    }
}

/// Per-window vertex state.
///
/// Vertex arrays are not shared between contexts, so a painter must be built and
/// used under the context its window is activated with.
pub struct GlPainter {
    vao: GlVertexArray,
    vbo: GlBuffer,
    ebo: GlBuffer,
    width: u32,
    height: u32,
}

impl GlPainter {
    /// Build the vertex array and its buffers. A context must be active.
    pub fn new(gl: &glow::Context, width: u32, height: u32) -> Result<Self, RenderError> {
        unsafe {
            let vao = gl.create_vertex_array().map_err(RenderError::Create)?;
            let vbo = gl.create_buffer().map_err(RenderError::Create)?;
            let ebo = gl.create_buffer().map_err(RenderError::Create)?;

            gl.bind_vertex_array(Some(vao));
            gl.bind_buffer(glow::ARRAY_BUFFER, Some(vbo));
            gl.bind_buffer(glow::ELEMENT_ARRAY_BUFFER, Some(ebo));

            let stride = size_of::<Vertex>() as i32;
            gl.enable_vertex_attrib_array(0);
            gl.vertex_attrib_pointer_f32(0, 2, glow::FLOAT, false, stride, offset_of!(Vertex, pos) as i32);
            gl.enable_vertex_attrib_array(1);
            gl.vertex_attrib_pointer_f32(1, 2, glow::FLOAT, false, stride, offset_of!(Vertex, uv) as i32);
            gl.enable_vertex_attrib_array(2);
            gl.vertex_attrib_pointer_f32(2, 4, glow::FLOAT, false, stride, offset_of!(Vertex, color) as i32);

            gl.bind_vertex_array(None);
            gl.bind_buffer(glow::ARRAY_BUFFER, None);

            let painter = Self { vao, vbo, ebo, width, height };
            if let Err(e) = check_error(gl, "painter setup") {
                painter.destroy(gl);
                return Err(e);
            }
            debug!("Painter ready ({}x{})", width, height);
            Ok(painter)
        }
    }

    /// Issue the draw list against the active framebuffer.
    pub fn paint(&self, gl: &glow::Context, pipeline: &TextPipeline, list: &DrawList) -> Result<(), RenderError> {
        if list.is_empty() {
            return Ok(());
        }

        unsafe {
            gl.viewport(0, 0, self.width as i32, self.height as i32);
            gl.enable(glow::BLEND);
            gl.blend_func(glow::SRC_ALPHA, glow::ONE_MINUS_SRC_ALPHA);
            gl.disable(glow::DEPTH_TEST);

            gl.use_program(Some(pipeline.program));
            gl.uniform_2_f32(pipeline.u_screen.as_ref(), self.width as f32, self.height as f32);
            gl.uniform_1_i32(pipeline.u_atlas.as_ref(), 0);

            gl.active_texture(glow::TEXTURE0);
            gl.bind_texture(glow::TEXTURE_2D, Some(pipeline.atlas));

            gl.bind_vertex_array(Some(self.vao));
            gl.bind_buffer(glow::ARRAY_BUFFER, Some(self.vbo));
            gl.buffer_data_u8_slice(glow::ARRAY_BUFFER, bytemuck::cast_slice(&list.vertices), glow::STREAM_DRAW);
            gl.bind_buffer(glow::ELEMENT_ARRAY_BUFFER, Some(self.ebo));
            gl.buffer_data_u8_slice(glow::ELEMENT_ARRAY_BUFFER, bytemuck::cast_slice(&list.indices), glow::STREAM_DRAW);

            gl.draw_elements(glow::TRIANGLES, list.indices.len() as i32, glow::UNSIGNED_INT, 0);

            gl.bind_vertex_array(None);
            gl.bind_texture(glow::TEXTURE_2D, None);
            gl.use_program(None);

            check_error(gl, "paint")
        }
    }

    /// Delete the vertex array and buffers. The owning context must be active.
    pub fn destroy(self, gl: &glow::Context) {
        unsafe {
            gl.delete_vertex_array(self.vao);
            gl.delete_buffer(self.vbo);
            gl.delete_buffer(self.ebo);
        }
    }
}

unsafe fn check_error(gl: &glow::Context, operation: &'static str) -> Result<(), RenderError> {
    match gl.get_error() {
        glow::NO_ERROR => Ok(()),
        code => Err(RenderError::Gl { code, operation }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_shared_resource_is_created_once_and_freed_by_the_last_user() {
        let mut shared: Shared<u32> = Shared::default();
        let mut created = 0;

        for _ in 0..3 {
            let value = shared
                .acquire(|| {
                    created += 1;
                    Ok::<_, RenderError>(7)
                })
                .unwrap();
            assert_eq!(*value, 7);
        }
        assert_eq!(created, 1);
        assert_eq!(shared.users(), 3);

        assert_eq!(shared.release(), None);
        assert_eq!(shared.release(), None);
        assert_eq!(shared.get(), Some(&7));
        assert_eq!(shared.release(), Some(7));
        assert_eq!(shared.get(), None);
    }

    #[test]
    fn test_failed_creation_leaves_no_user() {
        let mut shared: Shared<u32> = Shared::default();
        let result = shared.acquire(|| Err(RenderError::Create("no program".to_string())));
        assert!(result.is_err());
        assert_eq!(shared.users(), 0);

        assert_eq!(*shared.acquire(|| Ok::<_, RenderError>(3)).unwrap(), 3);
        assert_eq!(shared.users(), 1);
    }
}
