// Test doubles: a GL implementation that records every call and hands out
// plain integer ids, and a host surface driven by hand.

use crate::render::{Gpu, ShaderStage};
use crate::surface::{FrameRequest, Surface};
use rustc_hash::{FxHashMap, FxHashSet};
use std::cell::{Cell, RefCell};
use std::rc::Rc;

#[derive(Clone, Debug, PartialEq)]
pub enum Call {
    UseProgram(Option<u32>),
    BindVertexArray(Option<u32>),
    Uniform1(String, f32),
    Uniform2(String, f32, f32),
    Uniform3(String, [f32; 3]),
    Viewport(i32, i32, i32, i32),
    Clear([f32; 4]),
    DrawTriangles { first: i32, count: i32 },
}

#[derive(Default)]
struct Record {
    next_id: u32,
    live: FxHashSet<u32>,
    allocations: usize,
    releases: usize,
    double_releases: usize,

    shader_sources: FxHashMap<u32, String>,
    compiled: FxHashMap<u32, bool>,
    attached: FxHashMap<u32, Vec<u32>>,
    linked_sources: FxHashMap<u32, String>,
    buffer_data: Vec<Vec<f32>>,
    uniform_lookups: usize,

    calls: Vec<Call>,
}

impl Record {
    fn allocate(&mut self) -> u32 {
        self.next_id += 1;
        self.allocations += 1;
        self.live.insert(self.next_id);
        self.next_id
    }

    fn release(&mut self, id: u32) {
        if self.live.remove(&id) {
            self.releases += 1;
        } else {
            self.double_releases += 1;
        }
    }
}

/// Compiles any source containing `void main`, fails everything else.
#[derive(Default)]
pub struct RecordingGpu {
    record: RefCell<Record>,
    fail_link: Cell<bool>,
    fail_buffer: Cell<bool>,
}

impl RecordingGpu {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing_link() -> Self {
        let gpu = Self::default();
        gpu.fail_link.set(true);
        gpu
    }

    pub fn failing_buffer() -> Self {
        let gpu = Self::default();
        gpu.fail_buffer.set(true);
        gpu
    }

    pub fn allocations(&self) -> usize {
        self.record.borrow().allocations
    }

    pub fn releases(&self) -> usize {
        self.record.borrow().releases
    }

    pub fn double_releases(&self) -> usize {
        self.record.borrow().double_releases
    }

    pub fn live_resources(&self) -> usize {
        self.record.borrow().live.len()
    }

    pub fn uniform_lookups(&self) -> usize {
        self.record.borrow().uniform_lookups
    }

    pub fn buffer_data(&self) -> Vec<Vec<f32>> {
        self.record.borrow().buffer_data.clone()
    }

    pub fn calls(&self) -> Vec<Call> {
        self.record.borrow().calls.clone()
    }

    pub fn clear_calls(&self) {
        self.record.borrow_mut().calls.clear();
    }

    pub fn draw_calls(&self) -> Vec<Call> {
        self.calls()
            .into_iter()
            .filter(|call| matches!(call, Call::DrawTriangles { .. }))
            .collect()
    }

    pub fn viewports(&self) -> Vec<(i32, i32, i32, i32)> {
        self.calls()
            .into_iter()
            .filter_map(|call| match call {
                Call::Viewport(x, y, width, height) => Some((x, y, width, height)),
                _ => None,
            })
            .collect()
    }

    pub fn uniform_1_values(&self, name: &str) -> Vec<f32> {
        self.calls()
            .into_iter()
            .filter_map(|call| match call {
                Call::Uniform1(uniform, value) if uniform == name => Some(value),
                _ => None,
            })
            .collect()
    }

    pub fn uniform_3_values(&self, name: &str) -> Vec<[f32; 3]> {
        self.calls()
            .into_iter()
            .filter_map(|call| match call {
                Call::Uniform3(uniform, value) if uniform == name => Some(value),
                _ => None,
            })
            .collect()
    }

    fn push(&self, call: Call) {
        self.record.borrow_mut().calls.push(call);
    }
}

impl Gpu for RecordingGpu {
    type Shader = u32;
    type Program = u32;
    type Buffer = u32;
    type VertexArray = u32;
    type UniformLocation = String;

    fn create_shader(&self, _stage: ShaderStage) -> Result<u32, String> {
        Ok(self.record.borrow_mut().allocate())
    }

    fn shader_source(&self, shader: u32, source: &str) {
        self.record
            .borrow_mut()
            .shader_sources
            .insert(shader, source.to_string());
    }

    fn compile_shader(&self, shader: u32) {
        let mut record = self.record.borrow_mut();
        let ok = record
            .shader_sources
            .get(&shader)
            .is_some_and(|source| source.contains("void main"));
        record.compiled.insert(shader, ok);
    }

    fn get_shader_compile_status(&self, shader: u32) -> bool {
        self.record
            .borrow()
            .compiled
            .get(&shader)
            .copied()
            .unwrap_or(false)
    }

    fn get_shader_info_log(&self, shader: u32) -> String {
        if self.get_shader_compile_status(shader) {
            String::new()
        } else {
            "ERROR: 0:1: 'main' : function not found".to_string()
        }
    }

    fn delete_shader(&self, shader: u32) {
        self.record.borrow_mut().release(shader);
    }

    fn create_program(&self) -> Result<u32, String> {
        Ok(self.record.borrow_mut().allocate())
    }

    fn attach_shader(&self, program: u32, shader: u32) {
        self.record
            .borrow_mut()
            .attached
            .entry(program)
            .or_default()
            .push(shader);
    }

    fn detach_shader(&self, program: u32, shader: u32) {
        if let Some(shaders) = self.record.borrow_mut().attached.get_mut(&program) {
            shaders.retain(|&attached| attached != shader);
        }
    }

    fn link_program(&self, program: u32) {
        if self.fail_link.get() {
            return;
        }
        let mut record = self.record.borrow_mut();
        let source = record
            .attached
            .get(&program)
            .into_iter()
            .flatten()
            .filter_map(|shader| record.shader_sources.get(shader))
            .cloned()
            .collect::<Vec<_>>()
            .join("\n");
        record.linked_sources.insert(program, source);
    }

    fn get_program_link_status(&self, program: u32) -> bool {
        self.record.borrow().linked_sources.contains_key(&program)
    }

    fn get_program_info_log(&self, program: u32) -> String {
        if self.get_program_link_status(program) {
            String::new()
        } else {
            "ERROR: Linking failed".to_string()
        }
    }

    fn use_program(&self, program: Option<u32>) {
        self.push(Call::UseProgram(program));
    }

    fn delete_program(&self, program: u32) {
        self.record.borrow_mut().release(program);
    }

    fn create_buffer(&self) -> Result<u32, String> {
        if self.fail_buffer.get() {
            return Err("out of memory".to_string());
        }
        Ok(self.record.borrow_mut().allocate())
    }

    fn bind_array_buffer(&self, _buffer: Option<u32>) {}

    fn array_buffer_data_f32(&self, data: &[f32]) {
        self.record.borrow_mut().buffer_data.push(data.to_vec());
    }

    fn delete_buffer(&self, buffer: u32) {
        self.record.borrow_mut().release(buffer);
    }

    fn create_vertex_array(&self) -> Result<u32, String> {
        Ok(self.record.borrow_mut().allocate())
    }

    fn bind_vertex_array(&self, vertex_array: Option<u32>) {
        self.push(Call::BindVertexArray(vertex_array));
    }

    fn delete_vertex_array(&self, vertex_array: u32) {
        self.record.borrow_mut().release(vertex_array);
    }

    fn get_attrib_location(&self, program: u32, name: &str) -> Option<u32> {
        self.record
            .borrow()
            .linked_sources
            .get(&program)
            .filter(|source| source.contains(name))
            .map(|_| 0)
    }

    fn enable_vertex_attrib_array(&self, _index: u32) {}

    fn vertex_attrib_pointer_f32(&self, _index: u32, _size: i32, _stride: i32, _offset: i32) {}

    fn get_uniform_location(&self, program: u32, name: &str) -> Option<String> {
        let mut record = self.record.borrow_mut();
        record.uniform_lookups += 1;
        record
            .linked_sources
            .get(&program)
            .filter(|source| source.contains(name))
            .map(|_| name.to_string())
    }

    fn uniform_1_f32(&self, location: &String, x: f32) {
        self.push(Call::Uniform1(location.clone(), x));
    }

    fn uniform_2_f32(&self, location: &String, x: f32, y: f32) {
        self.push(Call::Uniform2(location.clone(), x, y));
    }

    fn uniform_3_f32(&self, location: &String, x: f32, y: f32, z: f32) {
        self.push(Call::Uniform3(location.clone(), [x, y, z]));
    }

    fn viewport(&self, x: i32, y: i32, width: i32, height: i32) {
        self.push(Call::Viewport(x, y, width, height));
    }

    fn clear(&self, red: f32, green: f32, blue: f32, alpha: f32) {
        self.push(Call::Clear([red, green, blue, alpha]));
    }

    fn draw_triangles(&self, first: i32, count: i32) {
        self.push(Call::DrawTriangles { first, count });
    }
}

/// A host surface whose frames, resizes and context losses are triggered by
/// the test.
pub struct FakeSurface {
    pub context: Option<Rc<RecordingGpu>>,
    pub logical_size: (u32, u32),
    pub pixel_ratio: f64,
    pub backing_size: Option<(u32, u32)>,
    pub context_lost: bool,
    pub restores_context: bool,
    pub listening: bool,
    pub pending_frame: Option<FrameRequest>,
    pub frames_requested: usize,
    pub frames_cancelled: usize,
    pub contexts_acquired: usize,
    next_request: i32,
}

impl FakeSurface {
    pub fn new(context: &Rc<RecordingGpu>, width: u32, height: u32) -> Self {
        Self {
            context: Some(Rc::clone(context)),
            logical_size: (width, height),
            pixel_ratio: 1.0,
            backing_size: None,
            context_lost: false,
            restores_context: false,
            listening: false,
            pending_frame: None,
            frames_requested: 0,
            frames_cancelled: 0,
            contexts_acquired: 0,
            next_request: 0,
        }
    }

    pub fn without_context() -> Self {
        Self {
            context: None,
            ..Self::new(&Rc::new(RecordingGpu::new()), 800, 600)
        }
    }
}

impl Surface for FakeSurface {
    type Gpu = RecordingGpu;

    fn acquire_context(&mut self) -> Option<Rc<RecordingGpu>> {
        self.contexts_acquired += 1;
        // A freshly acquired context starts out alive
        if self.context.is_some() {
            self.context_lost = false;
        }
        self.context.clone()
    }

    fn logical_size(&self) -> (u32, u32) {
        self.logical_size
    }

    fn device_pixel_ratio(&self) -> f64 {
        self.pixel_ratio
    }

    fn set_backing_size(&mut self, width: u32, height: u32) {
        self.backing_size = Some((width, height));
    }

    fn request_frame(&mut self) -> FrameRequest {
        assert!(
            self.pending_frame.is_none(),
            "requested a frame while one is pending"
        );
        self.next_request += 1;
        self.frames_requested += 1;
        let request = FrameRequest(self.next_request);
        self.pending_frame = Some(request);
        request
    }

    fn cancel_frame(&mut self, request: FrameRequest) {
        if self.pending_frame == Some(request) {
            self.pending_frame = None;
            self.frames_cancelled += 1;
        }
    }

    fn listen_for_resize(&mut self) {
        self.listening = true;
    }

    fn stop_listening_for_resize(&mut self) {
        self.listening = false;
    }

    fn is_context_lost(&self) -> bool {
        self.context_lost
    }

    fn restores_lost_context(&self) -> bool {
        self.restores_context
    }
}
