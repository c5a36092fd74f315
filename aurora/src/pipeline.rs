use crate::data;
use crate::render::{CompileError, Gpu, Problem, ShaderStage};
use crate::uniforms::UniformLocations;
use std::rc::Rc;

type Result<T> = std::result::Result<T, Problem>;

pub static AURORA_VERT_SHADER: &str =
    include_str!(concat!(env!("OUT_DIR"), "/shaders/aurora.vert"));
pub static AURORA_FRAG_SHADER: &str =
    include_str!(concat!(env!("OUT_DIR"), "/shaders/aurora.frag"));

/// Name of the clip-space position attribute in the vertex stage.
pub const POSITION_ATTRIBUTE: &str = "position";

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ShaderSources<'a> {
    pub vertex: &'a str,
    pub fragment: &'a str,
}

impl Default for ShaderSources<'static> {
    fn default() -> Self {
        Self {
            vertex: AURORA_VERT_SHADER,
            fragment: AURORA_FRAG_SHADER,
        }
    }
}

struct Resources<G: Gpu> {
    program: G::Program,
    vertex_array: G::VertexArray,
    vertex_buffer: G::Buffer,
    position_attribute: Option<u32>,
    uniforms: UniformLocations<G>,
}

/// A linked program and its full-viewport quad.
///
/// Releasing is idempotent. Dropping a handle releases it.
pub struct PipelineHandle<G: Gpu> {
    context: Rc<G>,
    resources: Option<Resources<G>>,
}

impl<G: Gpu> Drop for PipelineHandle<G> {
    fn drop(&mut self) {
        self.destroy();
    }
}

impl<G: Gpu> PipelineHandle<G> {
    pub fn new(context: &Rc<G>, sources: &ShaderSources) -> Result<Self> {
        let program = build_program(context.as_ref(), sources)?;

        let vertex_array = match context.create_vertex_array() {
            Ok(vertex_array) => vertex_array,
            Err(_) => {
                context.delete_program(program);
                return Err(Problem::CannotCreateVertexArray);
            }
        };

        let vertex_buffer = match context.create_buffer() {
            Ok(buffer) => buffer,
            Err(_) => {
                context.delete_vertex_array(vertex_array);
                context.delete_program(program);
                return Err(Problem::CannotCreateBuffer);
            }
        };

        let position_attribute = context.get_attrib_location(program, POSITION_ATTRIBUTE);

        context.bind_vertex_array(Some(vertex_array));
        context.bind_array_buffer(Some(vertex_buffer));
        context.array_buffer_data_f32(&data::PLANE_VERTICES);
        if let Some(location) = position_attribute {
            context.enable_vertex_attrib_array(location);
            context.vertex_attrib_pointer_f32(location, 2, 0, 0);
        } else {
            log::debug!(
                "The vertex stage does not read `{}`; drawing without vertex data",
                POSITION_ATTRIBUTE
            );
        }
        context.bind_vertex_array(None);
        context.bind_array_buffer(None);

        let uniforms = UniformLocations::new(context.as_ref(), program);
        let missing = uniforms.missing();
        if !missing.is_empty() {
            log::debug!("Inactive uniforms: {}", missing.join(", "));
        }

        log::info!("Created the aurora pipeline");

        Ok(Self {
            context: Rc::clone(context),
            resources: Some(Resources {
                program,
                vertex_array,
                vertex_buffer,
                position_attribute,
                uniforms,
            }),
        })
    }

    pub fn is_released(&self) -> bool {
        self.resources.is_none()
    }

    pub fn program(&self) -> Option<G::Program> {
        self.resources.as_ref().map(|resources| resources.program)
    }

    pub fn vertex_buffer(&self) -> Option<G::Buffer> {
        self.resources.as_ref().map(|resources| resources.vertex_buffer)
    }

    pub fn position_attribute(&self) -> Option<u32> {
        self.resources
            .as_ref()
            .and_then(|resources| resources.position_attribute)
    }

    pub fn uniforms(&self) -> Option<&UniformLocations<G>> {
        self.resources.as_ref().map(|resources| &resources.uniforms)
    }

    pub fn use_program(&self) {
        if let Some(resources) = &self.resources {
            self.context.use_program(Some(resources.program));
        }
    }

    /// Draw the quad as two triangles. The program must be in use.
    pub fn draw(&self) {
        if let Some(resources) = &self.resources {
            self.context.bind_vertex_array(Some(resources.vertex_array));
            self.context
                .draw_triangles(0, data::PLANE_VERTEX_COUNT as i32);
            self.context.bind_vertex_array(None);
        }
    }

    pub fn destroy(&mut self) {
        if let Some(resources) = self.resources.take() {
            self.context.delete_vertex_array(resources.vertex_array);
            self.context.delete_buffer(resources.vertex_buffer);
            self.context.delete_program(resources.program);
            log::info!("Released the aurora pipeline");
        }
    }

    /// Drop the handle's ids without touching the context. Use this once the
    /// context is lost: the ids are already gone on the GPU side.
    pub fn forget(&mut self) {
        if self.resources.take().is_some() {
            log::debug!("Forgot the aurora pipeline of a lost context");
        }
    }
}

fn build_program<G: Gpu>(context: &G, sources: &ShaderSources) -> Result<G::Program> {
    // Compile both stages before reporting, so a broken vertex stage doesn't
    // hide errors in the fragment stage.
    let vertex_shader = compile_shader(context, ShaderStage::Vertex, sources.vertex);
    let fragment_shader = compile_shader(context, ShaderStage::Fragment, sources.fragment);

    let (vertex_shader, fragment_shader) = match (vertex_shader, fragment_shader) {
        (Ok(vertex_shader), Ok(fragment_shader)) => (vertex_shader, fragment_shader),
        (Ok(shader), Err(problem)) | (Err(problem), Ok(shader)) => {
            context.delete_shader(shader);
            return Err(problem);
        }
        (Err(vertex_problem), Err(fragment_problem)) => {
            return Err(merge_problems(vertex_problem, fragment_problem));
        }
    };

    let delete_shaders = || {
        context.delete_shader(vertex_shader);
        context.delete_shader(fragment_shader);
    };

    let program = match context.create_program() {
        Ok(program) => program,
        Err(_) => {
            delete_shaders();
            return Err(Problem::CannotCreateProgram);
        }
    };

    context.attach_shader(program, vertex_shader);
    context.attach_shader(program, fragment_shader);
    context.link_program(program);
    let linked = context.get_program_link_status(program);

    // The shaders are not needed after linking, whatever the outcome.
    context.detach_shader(program, vertex_shader);
    context.detach_shader(program, fragment_shader);
    delete_shaders();

    if linked {
        Ok(program)
    } else {
        let log = context.get_program_info_log(program);
        context.delete_program(program);
        Err(Problem::CannotLinkProgram(log))
    }
}

fn compile_shader<G: Gpu>(context: &G, stage: ShaderStage, source: &str) -> Result<G::Shader> {
    let shader = context
        .create_shader(stage)
        .map_err(|_| Problem::CannotCreateShader(stage))?;
    context.shader_source(shader, source);
    context.compile_shader(shader);

    if context.get_shader_compile_status(shader) {
        Ok(shader)
    } else {
        let log = context.get_shader_info_log(shader);
        context.delete_shader(shader);
        Err(Problem::CannotCompileShaders(vec![CompileError { stage, log }]))
    }
}

fn merge_problems(first: Problem, second: Problem) -> Problem {
    match (first, second) {
        (Problem::CannotCompileShaders(mut errors), Problem::CannotCompileShaders(more)) => {
            errors.extend(more);
            Problem::CannotCompileShaders(errors)
        }
        (Problem::CannotCompileShaders(_), other) => other,
        (first, _) => first,
    }
}
