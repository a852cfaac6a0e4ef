#[cfg(target_arch = "wasm32")]
mod imp {
    use ::wgpu::util::DeviceExt;
    use std::borrow::Cow;
    use wasm_bindgen::prelude::*;

    use crate::bake::{ColorVertex, DrawBatches};

    #[derive(Debug)]
    pub struct WgpuContext {
        pub _instance: &'static ::wgpu::Instance,
        pub surface: ::wgpu::Surface<'static>,
        pub device: ::wgpu::Device,
        pub queue: ::wgpu::Queue,
        pub config: ::wgpu::SurfaceConfiguration,
        pub _canvas: web_sys::HtmlCanvasElement,
        pub opaque_pipeline: ::wgpu::RenderPipeline,
        pub blended_pipeline: ::wgpu::RenderPipeline,
        pub additive_pipeline: ::wgpu::RenderPipeline,
        pub line_pipeline: ::wgpu::RenderPipeline,
        pub uniform_buffer: ::wgpu::Buffer,
        pub uniform_bind_group: ::wgpu::BindGroup,
        pub depth_view: ::wgpu::TextureView,
    }

    const SCENE_SHADER: &str = r#"
struct Globals {
    view_proj: mat4x4<f32>,
};

@group(0) @binding(0)
var<uniform> globals: Globals;

struct VsOut {
    @builtin(position) pos: vec4<f32>,
    @location(0) color: vec4<f32>,
};

@vertex
fn vs_main(@location(0) position: vec3<f32>, @location(1) color: vec4<f32>) -> VsOut {
    return VsOut(globals.view_proj * vec4<f32>(position, 1.0), color);
}

@fragment
fn fs_main(fs_in: VsOut) -> @location(0) vec4<f32> {
    return fs_in.color;
}
"#;

    const ADDITIVE_BLENDING: ::wgpu::BlendState = ::wgpu::BlendState {
        color: ::wgpu::BlendComponent {
            src_factor: ::wgpu::BlendFactor::SrcAlpha,
            dst_factor: ::wgpu::BlendFactor::One,
            operation: ::wgpu::BlendOperation::Add,
        },
        alpha: ::wgpu::BlendComponent {
            src_factor: ::wgpu::BlendFactor::One,
            dst_factor: ::wgpu::BlendFactor::One,
            operation: ::wgpu::BlendOperation::Add,
        },
    };

    #[repr(C)]
    #[derive(Copy, Clone, bytemuck::Pod, bytemuck::Zeroable)]
    struct Globals {
        view_proj: [[f32; 4]; 4],
    }

    fn create_depth_view(
        device: &::wgpu::Device,
        config: &::wgpu::SurfaceConfiguration,
    ) -> ::wgpu::TextureView {
        let tex = device.create_texture(&::wgpu::TextureDescriptor {
            label: Some("map-depth"),
            size: ::wgpu::Extent3d {
                width: config.width.max(1),
                height: config.height.max(1),
                depth_or_array_layers: 1,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: ::wgpu::TextureDimension::D2,
            format: ::wgpu::TextureFormat::Depth24Plus,
            usage: ::wgpu::TextureUsages::RENDER_ATTACHMENT,
            view_formats: &[],
        });
        tex.create_view(&::wgpu::TextureViewDescriptor::default())
    }

    struct PassStyle {
        label: &'static str,
        topology: ::wgpu::PrimitiveTopology,
        blend: ::wgpu::BlendState,
        depth_write: bool,
    }

    fn color_pipeline(
        device: &::wgpu::Device,
        layout: &::wgpu::PipelineLayout,
        shader: &::wgpu::ShaderModule,
        format: ::wgpu::TextureFormat,
        style: PassStyle,
    ) -> ::wgpu::RenderPipeline {
        device.create_render_pipeline(&::wgpu::RenderPipelineDescriptor {
            label: Some(style.label),
            layout: Some(layout),
            vertex: ::wgpu::VertexState {
                module: shader,
                entry_point: Some("vs_main"),
                compilation_options: Default::default(),
                buffers: &[::wgpu::VertexBufferLayout {
                    array_stride: std::mem::size_of::<ColorVertex>() as ::wgpu::BufferAddress,
                    step_mode: ::wgpu::VertexStepMode::Vertex,
                    attributes: &[
                        ::wgpu::VertexAttribute {
                            format: ::wgpu::VertexFormat::Float32x3,
                            offset: 0,
                            shader_location: 0,
                        },
                        ::wgpu::VertexAttribute {
                            format: ::wgpu::VertexFormat::Float32x4,
                            offset: 12,
                            shader_location: 1,
                        },
                    ],
                }],
            },
            fragment: Some(::wgpu::FragmentState {
                module: shader,
                entry_point: Some("fs_main"),
                compilation_options: Default::default(),
                targets: &[Some(::wgpu::ColorTargetState {
                    format,
                    blend: Some(style.blend),
                    write_mask: ::wgpu::ColorWrites::ALL,
                })],
            }),
            primitive: ::wgpu::PrimitiveState {
                topology: style.topology,
                strip_index_format: None,
                front_face: ::wgpu::FrontFace::Ccw,
                // Extruded walls and flat decorations are seen from both sides.
                cull_mode: None,
                polygon_mode: ::wgpu::PolygonMode::Fill,
                unclipped_depth: false,
                conservative: false,
            },
            depth_stencil: Some(::wgpu::DepthStencilState {
                format: ::wgpu::TextureFormat::Depth24Plus,
                depth_write_enabled: style.depth_write,
                depth_compare: ::wgpu::CompareFunction::LessEqual,
                stencil: ::wgpu::StencilState::default(),
                bias: ::wgpu::DepthBiasState::default(),
            }),
            multisample: ::wgpu::MultisampleState::default(),
            multiview_mask: None,
            cache: None,
        })
    }

    pub async fn init_wgpu_from_canvas(
        canvas_elem: web_sys::HtmlCanvasElement,
    ) -> Result<WgpuContext, JsValue> {
        let width = canvas_elem.width();
        let height = canvas_elem.height();

        // `wgpu::Surface` must not outlive its `wgpu::Instance`; the instance
        // lives for the rest of the page.
        let instance: &'static ::wgpu::Instance = Box::leak(Box::new(::wgpu::Instance::new(
            &::wgpu::InstanceDescriptor {
                backends: ::wgpu::Backends::BROWSER_WEBGPU | ::wgpu::Backends::GL,
                ..Default::default()
            },
        )));

        let surface = instance
            .create_surface(::wgpu::SurfaceTarget::Canvas(canvas_elem.clone()))
            .map_err(|e| JsValue::from_str(&format!("surface error: {e}")))?;

        let adapter = instance
            .request_adapter(&::wgpu::RequestAdapterOptions {
                power_preference: ::wgpu::PowerPreference::HighPerformance,
                compatible_surface: Some(&surface),
                force_fallback_adapter: false,
            })
            .await
            .map_err(|e| JsValue::from_str(&format!("adapter error: {e}")))?;

        let (device, queue) = adapter
            .request_device(&::wgpu::DeviceDescriptor {
                label: Some("map-wgpu-device"),
                required_features: ::wgpu::Features::empty(),
                required_limits: ::wgpu::Limits::downlevel_webgl2_defaults(),
                ..Default::default()
            })
            .await
            .map_err(|e| JsValue::from_str(&format!("device error: {e}")))?;

        let surface_caps = surface.get_capabilities(&adapter);
        let format = surface_caps
            .formats
            .iter()
            .copied()
            .find(|f| f.is_srgb())
            .or_else(|| surface_caps.formats.first().copied())
            .ok_or_else(|| JsValue::from_str("surface reports no formats"))?;
        let alpha_mode = surface_caps
            .alpha_modes
            .first()
            .copied()
            .unwrap_or(::wgpu::CompositeAlphaMode::Auto);

        let config = ::wgpu::SurfaceConfiguration {
            usage: ::wgpu::TextureUsages::RENDER_ATTACHMENT,
            format,
            width: width.max(1),
            height: height.max(1),
            desired_maximum_frame_latency: 2,
            present_mode: ::wgpu::PresentMode::Fifo,
            alpha_mode,
            view_formats: vec![],
        };
        surface.configure(&device, &config);

        let depth_view = create_depth_view(&device, &config);

        let shader = device.create_shader_module(::wgpu::ShaderModuleDescriptor {
            label: Some("map-scene-shader"),
            source: ::wgpu::ShaderSource::Wgsl(Cow::Borrowed(SCENE_SHADER)),
        });

        let uniform_buffer = device.create_buffer(&::wgpu::BufferDescriptor {
            label: Some("map-globals"),
            size: std::mem::size_of::<Globals>() as u64,
            usage: ::wgpu::BufferUsages::UNIFORM | ::wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });

        let uniform_bind_group_layout =
            device.create_bind_group_layout(&::wgpu::BindGroupLayoutDescriptor {
                label: Some("map-globals-bgl"),
                entries: &[::wgpu::BindGroupLayoutEntry {
                    binding: 0,
                    visibility: ::wgpu::ShaderStages::VERTEX,
                    ty: ::wgpu::BindingType::Buffer {
                        ty: ::wgpu::BufferBindingType::Uniform,
                        has_dynamic_offset: false,
                        min_binding_size: None,
                    },
                    count: None,
                }],
            });

        let uniform_bind_group = device.create_bind_group(&::wgpu::BindGroupDescriptor {
            label: Some("map-globals-bg"),
            layout: &uniform_bind_group_layout,
            entries: &[::wgpu::BindGroupEntry {
                binding: 0,
                resource: uniform_buffer.as_entire_binding(),
            }],
        });

        let pipeline_layout = device.create_pipeline_layout(&::wgpu::PipelineLayoutDescriptor {
            label: Some("map-scene-pipeline-layout"),
            bind_group_layouts: &[&uniform_bind_group_layout],
            immediate_size: 0,
        });

        let build = |style: PassStyle| {
            color_pipeline(&device, &pipeline_layout, &shader, config.format, style)
        };
        let opaque_pipeline = build(PassStyle {
            label: "map-opaque-pipeline",
            topology: ::wgpu::PrimitiveTopology::TriangleList,
            blend: ::wgpu::BlendState::REPLACE,
            depth_write: true,
        });
        let blended_pipeline = build(PassStyle {
            label: "map-blended-pipeline",
            topology: ::wgpu::PrimitiveTopology::TriangleList,
            blend: ::wgpu::BlendState::ALPHA_BLENDING,
            depth_write: false,
        });
        let additive_pipeline = build(PassStyle {
            label: "map-additive-pipeline",
            topology: ::wgpu::PrimitiveTopology::TriangleList,
            blend: ADDITIVE_BLENDING,
            depth_write: false,
        });
        let line_pipeline = build(PassStyle {
            label: "map-line-pipeline",
            topology: ::wgpu::PrimitiveTopology::LineList,
            blend: ::wgpu::BlendState::ALPHA_BLENDING,
            depth_write: false,
        });

        let globals = Globals {
            view_proj: [[0.0; 4]; 4],
        };
        queue.write_buffer(&uniform_buffer, 0, bytemuck::bytes_of(&globals));

        Ok(WgpuContext {
            _instance: instance,
            surface,
            device,
            queue,
            config,
            _canvas: canvas_elem,
            opaque_pipeline,
            blended_pipeline,
            additive_pipeline,
            line_pipeline,
            uniform_buffer,
            uniform_bind_group,
            depth_view,
        })
    }

    pub fn resize_wgpu(ctx: &mut WgpuContext, width: u32, height: u32) {
        ctx.config.width = width.max(1);
        ctx.config.height = height.max(1);
        ctx.surface.configure(&ctx.device, &ctx.config);
        ctx.depth_view = create_depth_view(&ctx.device, &ctx.config);
    }

    fn upload(ctx: &WgpuContext, label: &str, vertices: &[ColorVertex]) -> Option<(::wgpu::Buffer, u32)> {
        if vertices.is_empty() {
            return None;
        }
        let buffer = ctx
            .device
            .create_buffer_init(&::wgpu::util::BufferInitDescriptor {
                label: Some(label),
                contents: bytemuck::cast_slice(vertices),
                usage: ::wgpu::BufferUsages::VERTEX,
            });
        Some((buffer, vertices.len() as u32))
    }

    pub fn render_batches(
        ctx: &WgpuContext,
        view_proj: [[f32; 4]; 4],
        batches: &DrawBatches,
    ) -> Result<(), JsValue> {
        let frame = ctx
            .surface
            .get_current_texture()
            .map_err(|e| JsValue::from_str(&format!("surface acquire failed: {e}")))?;
        let view = frame
            .texture
            .create_view(&::wgpu::TextureViewDescriptor::default());

        ctx.queue
            .write_buffer(&ctx.uniform_buffer, 0, bytemuck::bytes_of(&Globals { view_proj }));

        let passes = [
            (&ctx.opaque_pipeline, upload(ctx, "map-opaque-vertices", &batches.opaque)),
            (&ctx.line_pipeline, upload(ctx, "map-line-vertices", &batches.lines)),
            (&ctx.blended_pipeline, upload(ctx, "map-blended-vertices", &batches.blended)),
            (&ctx.additive_pipeline, upload(ctx, "map-additive-vertices", &batches.additive)),
        ];

        let mut encoder = ctx
            .device
            .create_command_encoder(&::wgpu::CommandEncoderDescriptor {
                label: Some("map-scene-encoder"),
            });

        {
            let clear = batches.clear;
            let mut rpass = encoder.begin_render_pass(&::wgpu::RenderPassDescriptor {
                label: Some("map-scene-pass"),
                color_attachments: &[Some(::wgpu::RenderPassColorAttachment {
                    view: &view,
                    resolve_target: None,
                    depth_slice: None,
                    ops: ::wgpu::Operations {
                        load: ::wgpu::LoadOp::Clear(::wgpu::Color {
                            r: clear.r as f64,
                            g: clear.g as f64,
                            b: clear.b as f64,
                            a: 1.0,
                        }),
                        store: ::wgpu::StoreOp::Store,
                    },
                })],
                depth_stencil_attachment: Some(::wgpu::RenderPassDepthStencilAttachment {
                    view: &ctx.depth_view,
                    depth_ops: Some(::wgpu::Operations {
                        load: ::wgpu::LoadOp::Clear(1.0),
                        store: ::wgpu::StoreOp::Store,
                    }),
                    stencil_ops: None,
                }),
                occlusion_query_set: None,
                timestamp_writes: None,
                multiview_mask: None,
            });

            rpass.set_bind_group(0, &ctx.uniform_bind_group, &[]);
            for (pipeline, stream) in &passes {
                let Some((buffer, count)) = stream else {
                    continue;
                };
                rpass.set_pipeline(pipeline);
                rpass.set_vertex_buffer(0, buffer.slice(..));
                rpass.draw(0..*count, 0..1);
            }
        }

        ctx.queue.submit(std::iter::once(encoder.finish()));
        frame.present();
        Ok(())
    }
}

#[cfg(not(target_arch = "wasm32"))]
mod imp {
    use wasm_bindgen::prelude::JsValue;

    use crate::bake::DrawBatches;

    #[derive(Debug, Default)]
    pub struct WgpuContext;

    pub async fn init_wgpu_from_canvas(
        _canvas: web_sys::HtmlCanvasElement,
    ) -> Result<WgpuContext, JsValue> {
        Err(JsValue::from_str(
            "wgpu initialization is only available on wasm32 targets",
        ))
    }

    pub fn resize_wgpu(_ctx: &mut WgpuContext, _width: u32, _height: u32) {}

    pub fn render_batches(
        _ctx: &WgpuContext,
        _view_proj: [[f32; 4]; 4],
        _batches: &DrawBatches,
    ) -> Result<(), JsValue> {
        Err(JsValue::from_str(
            "wgpu rendering is only available on wasm32 targets",
        ))
    }
}

pub use imp::{WgpuContext, init_wgpu_from_canvas, render_batches, resize_wgpu};
