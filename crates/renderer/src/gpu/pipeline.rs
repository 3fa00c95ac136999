use anyhow::{bail, Context, Result};

use crate::compile::{compile_fragment_shader, compile_vertex_shader, PreparedShader};

use super::uniforms::ReactiveBoxUniforms;

/// The single fullscreen-triangle pipeline plus the uniform block it reads.
pub(crate) struct BoxPipeline {
    pipeline: wgpu::RenderPipeline,
    uniforms: wgpu::Buffer,
    bind_group: wgpu::BindGroup,
}

impl BoxPipeline {
    pub(crate) fn new(
        device: &wgpu::Device,
        format: wgpu::TextureFormat,
        sample_count: u32,
        shader: &PreparedShader,
    ) -> Result<Self> {
        let vertex = compile_vertex_shader(device)?;
        let fragment = compile_fragment_shader(device, shader).context("failed to compile shader")?;

        let block_size = std::mem::size_of::<ReactiveBoxUniforms>() as wgpu::BufferAddress;
        let uniforms = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("ReactiveBoxParams"),
            size: block_size,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });
        let layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("ReactiveBoxParams layout"),
            entries: &[wgpu::BindGroupLayoutEntry {
                binding: 0,
                visibility: wgpu::ShaderStages::FRAGMENT,
                ty: wgpu::BindingType::Buffer {
                    ty: wgpu::BufferBindingType::Uniform,
                    has_dynamic_offset: false,
                    min_binding_size: wgpu::BufferSize::new(block_size),
                },
                count: None,
            }],
        });
        let bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("ReactiveBoxParams binding"),
            layout: &layout,
            entries: &[wgpu::BindGroupEntry {
                binding: 0,
                resource: uniforms.as_entire_binding(),
            }],
        });
        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("reactive box layout"),
            bind_group_layouts: &[&layout],
            push_constant_ranges: &[],
        });

        device.push_error_scope(wgpu::ErrorFilter::Validation);
        let pipeline = device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
            label: Some("reactive box"),
            layout: Some(&pipeline_layout),
            vertex: wgpu::VertexState {
                module: &vertex,
                entry_point: Some("main"),
                buffers: &[],
                compilation_options: Default::default(),
            },
            primitive: wgpu::PrimitiveState::default(),
            depth_stencil: None,
            multisample: wgpu::MultisampleState {
                count: sample_count,
                ..Default::default()
            },
            fragment: Some(wgpu::FragmentState {
                module: &fragment,
                entry_point: Some("main"),
                targets: &[Some(wgpu::ColorTargetState::from(format))],
                compilation_options: Default::default(),
            }),
            multiview: None,
            cache: None,
        });
        if let Some(err) = pollster::block_on(device.pop_error_scope()) {
            bail!("pipeline rejected {}: {err}", shader.path.display());
        }

        Ok(Self {
            pipeline,
            uniforms,
            bind_group,
        })
    }

    /// Uploads the block; the write lands before the next submitted draw.
    pub(crate) fn upload(&self, queue: &wgpu::Queue, block: &ReactiveBoxUniforms) {
        queue.write_buffer(&self.uniforms, 0, bytemuck::bytes_of(block));
    }

    pub(crate) fn draw(&self, pass: &mut wgpu::RenderPass<'_>) {
        pass.set_pipeline(&self.pipeline);
        pass.set_bind_group(0, &self.bind_group, &[]);
        pass.draw(0..3, 0..1);
    }
}
