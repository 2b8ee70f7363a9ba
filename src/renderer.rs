// renderer.rs — 渲染能力接口与 wgpu 实现（纹理球体 + 透视相机 + egui 覆盖层）

use crate::buffer::TextureSource;
use crate::error::{Result, ViewerError};
use crate::mesh::{build_sphere, SphereVertex};
use glam::{Mat4, Vec3};
use std::path::PathBuf;
use wgpu::util::DeviceExt;
use winit::window::Window;

const SPHERE_RADIUS: f32 = 200.0;
const SPHERE_LAT_SEGMENTS: usize = 64;
const SPHERE_LON_SEGMENTS: usize = 128;

/// Opaque id of a scene created by a [`Renderer`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SceneHandle(pub u32);

/// What the viewer needs from a graphics backend.
pub trait Renderer {
    /// Widest texture the backend can sample. `None` when rendering is not
    /// hardware accelerated.
    fn max_texture_width(&self) -> Option<u32>;

    fn create_scene(&mut self, texture: &TextureSource, fov_deg: f32, aspect: f32) -> Result<SceneHandle>;

    fn set_field_of_view(&mut self, scene: SceneHandle, fov_deg: f32);

    /// `direction` is a unit vector from the sphere's center.
    fn look_at(&mut self, scene: SceneHandle, direction: Vec3);

    fn render_frame(&mut self, scene: SceneHandle);

    /// Called with `None` when the viewport changes before any scene exists.
    fn resize(&mut self, scene: Option<SceneHandle>, width: u32, height: u32);
}

/// Searches a few well-known places for a font that covers CJK, Cyrillic and
/// Arabic text and installs it as egui's first choice.
fn install_ui_font(ctx: &egui::Context) {
    let mut candidates: Vec<PathBuf> = Vec::new();
    if cfg!(windows) {
        let dir = PathBuf::from(r"C:\Windows\Fonts");
        for f in ["msyh.ttf", "simhei.ttf", "malgun.ttf", "arialuni.ttf", "arial.ttf"] {
            candidates.push(dir.join(f));
        }
    } else if cfg!(target_os = "macos") {
        for f in [
            "/System/Library/Fonts/Supplemental/Arial Unicode.ttf",
            "/Library/Fonts/NotoSansSC-Regular.otf",
            "/System/Library/Fonts/Supplemental/Arial.ttf",
        ] {
            candidates.push(PathBuf::from(f));
        }
    } else {
        for f in [
            "/usr/share/fonts/opentype/noto/NotoSansCJK-Regular.ttc",
            "/usr/share/fonts/truetype/noto/NotoSansCJK-Regular.ttc",
            "/usr/share/fonts/truetype/wqy/wqy-microhei.ttc",
            "/usr/share/fonts/truetype/dejavu/DejaVuSans.ttf",
        ] {
            candidates.push(PathBuf::from(f));
        }
    }
    if let Some(dir) = std::env::current_exe().ok().and_then(|e| e.parent().map(|p| p.join("assets"))) {
        candidates.push(dir.join("ui-font.ttf"));
    }
    candidates.push(PathBuf::from("assets").join("ui-font.ttf"));

    // ab_glyph rejects some collections; skip anything it can't parse
    let chosen = candidates.into_iter().find_map(|p| {
        let bytes = std::fs::read(&p).ok()?;
        ab_glyph::FontArc::try_from_vec(bytes.clone()).ok()?;
        Some((p, bytes))
    });

    let Some((path, bytes)) = chosen else {
        log::warn!("{}", crate::i18n::tr("font.not_found"));
        return;
    };
    log::info!("{}", crate::i18n::tr_with("font.using", &[("path", path.display().to_string())]));

    let mut fonts = egui::FontDefinitions::default();
    fonts.font_data.insert("ui".to_owned(), egui::FontData::from_owned(bytes));
    for family in [egui::FontFamily::Proportional, egui::FontFamily::Monospace] {
        if let Some(list) = fonts.families.get_mut(&family) {
            list.insert(0, "ui".to_owned());
        }
    }
    ctx.set_fonts(fonts);
}

#[repr(C)]
#[derive(Debug, Copy, Clone, bytemuck::Pod, bytemuck::Zeroable)]
struct CameraUniform {
    view_proj: [[f32; 4]; 4],
}

/// Perspective camera at the sphere's center.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SphereCamera {
    pub fov_deg: f32,
    pub aspect: f32,
    pub direction: Vec3,
    /// Last horizontal heading, used for the up vector when looking
    /// straight up or down.
    heading: Vec3,
}

impl SphereCamera {
    pub fn new(fov_deg: f32, aspect: f32) -> Self {
        Self {
            fov_deg,
            aspect,
            direction: Vec3::Z,
            heading: Vec3::Z,
        }
    }

    pub fn look_at(&mut self, direction: Vec3) {
        let dir = direction.normalize_or_zero();
        if dir == Vec3::ZERO {
            return;
        }
        let flat = Vec3::new(dir.x, 0.0, dir.z);
        if flat.length() > 1e-4 {
            self.heading = flat.normalize();
        }
        self.direction = dir;
    }

    pub fn view_proj(&self) -> Mat4 {
        // near the poles Y and the view direction are parallel
        let up = if Vec3::new(self.direction.x, 0.0, self.direction.z).length() > 1e-4 {
            Vec3::Y
        } else {
            -self.heading * self.direction.y.signum()
        };
        let fov = self.fov_deg.clamp(1.0, 179.0).to_radians();
        let proj = Mat4::perspective_rh(fov, self.aspect.max(1e-3), 0.1, SPHERE_RADIUS * 2.0);
        let view = Mat4::look_at_rh(Vec3::ZERO, self.direction, up);
        proj * view
    }
}

struct GpuScene {
    handle: SceneHandle,
    camera: SphereCamera,
    bind_group: wgpu::BindGroup,
    _texture: wgpu::Texture,
}

pub struct WgpuRenderer {
    surface: wgpu::Surface,
    device: wgpu::Device,
    queue: wgpu::Queue,
    config: wgpu::SurfaceConfiguration,
    pub size: winit::dpi::PhysicalSize<u32>,
    accelerated: bool,
    render_pipeline: wgpu::RenderPipeline,

    bind_group_layout: wgpu::BindGroupLayout,
    sampler: wgpu::Sampler,
    camera_buffer: wgpu::Buffer,
    vertex_buffer: wgpu::Buffer,
    index_buffer: wgpu::Buffer,
    index_count: u32,

    scene: Option<GpuScene>,
    next_scene: u32,

    // UI
    pub egui_ctx: egui::Context,
    pub egui_state: egui_winit::State,
    egui_renderer: egui_wgpu::Renderer,
}

impl WgpuRenderer {
    pub async fn new(window: std::sync::Arc<Window>) -> Result<Self> {
        let size = window.inner_size();
        let instance = wgpu::Instance::new(wgpu::InstanceDescriptor {
            backends: wgpu::Backends::all(),
            ..Default::default()
        });

        let surface = unsafe { instance.create_surface(window.as_ref()) }
            .map_err(|e| ViewerError::UnsupportedEnvironment(e.to_string()))?;
        let adapter = instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference: wgpu::PowerPreference::HighPerformance,
                compatible_surface: Some(&surface),
                force_fallback_adapter: false,
            })
            .await
            .ok_or_else(|| ViewerError::UnsupportedEnvironment("no graphics adapter".into()))?;
        let info = adapter.get_info();
        let accelerated = info.device_type != wgpu::DeviceType::Cpu;
        log::info!("graphics adapter: {} ({:?})", info.name, info.backend);

        let (device, queue) = adapter
            .request_device(
                &wgpu::DeviceDescriptor {
                    features: wgpu::Features::empty(),
                    limits: wgpu::Limits::default().using_resolution(adapter.limits()),
                    label: None,
                },
                None,
            )
            .await
            .map_err(|e| ViewerError::UnsupportedEnvironment(e.to_string()))?;

        let surface_caps = surface.get_capabilities(&adapter);
        let surface_format = surface_caps
            .formats
            .iter()
            .copied()
            .find(|f| f.is_srgb())
            .or_else(|| surface_caps.formats.first().copied())
            .ok_or_else(|| ViewerError::UnsupportedEnvironment("surface has no formats".into()))?;

        let config = wgpu::SurfaceConfiguration {
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            format: surface_format,
            width: size.width.max(1),
            height: size.height.max(1),
            present_mode: wgpu::PresentMode::Fifo,
            alpha_mode: surface_caps.alpha_modes.first().copied().unwrap_or(wgpu::CompositeAlphaMode::Auto),
            view_formats: vec![],
        };
        surface.configure(&device, &config);

        let sampler = device.create_sampler(&wgpu::SamplerDescriptor {
            address_mode_u: wgpu::AddressMode::Repeat, // 经度方向首尾相接
            address_mode_v: wgpu::AddressMode::ClampToEdge,
            address_mode_w: wgpu::AddressMode::ClampToEdge,
            mag_filter: wgpu::FilterMode::Linear,
            min_filter: wgpu::FilterMode::Linear,
            mipmap_filter: wgpu::FilterMode::Nearest,
            ..Default::default()
        });

        let camera = SphereCamera::new(90.0, config.width as f32 / config.height as f32);
        let camera_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("Camera Buffer"),
            contents: bytemuck::cast_slice(&[CameraUniform {
                view_proj: camera.view_proj().to_cols_array_2d(),
            }]),
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
        });

        let mesh = build_sphere(SPHERE_RADIUS, SPHERE_LAT_SEGMENTS, SPHERE_LON_SEGMENTS);
        let vertex_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("Sphere Vertices"),
            contents: bytemuck::cast_slice(&mesh.vertices),
            usage: wgpu::BufferUsages::VERTEX,
        });
        let index_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("Sphere Indices"),
            contents: bytemuck::cast_slice(&mesh.indices),
            usage: wgpu::BufferUsages::INDEX,
        });

        let bind_group_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            entries: &[
                wgpu::BindGroupLayoutEntry {
                    binding: 0,
                    visibility: wgpu::ShaderStages::VERTEX,
                    ty: wgpu::BindingType::Buffer {
                        ty: wgpu::BufferBindingType::Uniform,
                        has_dynamic_offset: false,
                        min_binding_size: None,
                    },
                    count: None,
                },
                wgpu::BindGroupLayoutEntry {
                    binding: 1,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Texture {
                        multisampled: false,
                        view_dimension: wgpu::TextureViewDimension::D2,
                        sample_type: wgpu::TextureSampleType::Float { filterable: true },
                    },
                    count: None,
                },
                wgpu::BindGroupLayoutEntry {
                    binding: 2,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering),
                    count: None,
                },
            ],
            label: Some("sphere_bind_group_layout"),
        });

        let shader = device.create_shader_module(wgpu::include_wgsl!("shader_sphere.wgsl"));
        let render_pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("Render Pipeline Layout"),
            bind_group_layouts: &[&bind_group_layout],
            push_constant_ranges: &[],
        });

        let render_pipeline = device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
            label: Some("Sphere Pipeline"),
            layout: Some(&render_pipeline_layout),
            vertex: wgpu::VertexState {
                module: &shader,
                entry_point: "vs_main",
                buffers: &[wgpu::VertexBufferLayout {
                    array_stride: std::mem::size_of::<SphereVertex>() as wgpu::BufferAddress,
                    step_mode: wgpu::VertexStepMode::Vertex,
                    attributes: &wgpu::vertex_attr_array![0 => Float32x3, 1 => Float32x2],
                }],
            },
            fragment: Some(wgpu::FragmentState {
                module: &shader,
                entry_point: "fs_main",
                targets: &[Some(wgpu::ColorTargetState {
                    format: config.format,
                    blend: Some(wgpu::BlendState::REPLACE),
                    write_mask: wgpu::ColorWrites::ALL,
                })],
            }),
            primitive: wgpu::PrimitiveState {
                topology: wgpu::PrimitiveTopology::TriangleList,
                strip_index_format: None,
                front_face: wgpu::FrontFace::Ccw,
                cull_mode: None, // 相机位于球内，正反面都要画
                polygon_mode: wgpu::PolygonMode::Fill,
                unclipped_depth: false,
                conservative: false,
            },
            depth_stencil: None,
            multisample: wgpu::MultisampleState {
                count: 1,
                mask: !0,
                alpha_to_coverage_enabled: false,
            },
            multiview: None,
        });

        let egui_ctx = egui::Context::default();
        install_ui_font(&egui_ctx);
        let mut egui_state = egui_winit::State::new(window.as_ref());
        egui_state.set_pixels_per_point(window.scale_factor() as f32);
        let egui_renderer = egui_wgpu::Renderer::new(&device, config.format, None, 1);

        Ok(Self {
            surface,
            device,
            queue,
            config,
            size,
            accelerated,
            render_pipeline,
            bind_group_layout,
            sampler,
            camera_buffer,
            vertex_buffer,
            index_buffer,
            index_count: mesh.indices.len() as u32,
            scene: None,
            next_scene: 0,
            egui_ctx,
            egui_state,
            egui_renderer,
        })
    }

    fn scene_mut(&mut self, handle: SceneHandle) -> Option<&mut GpuScene> {
        match self.scene.as_mut() {
            Some(s) if s.handle == handle => Some(s),
            _ => {
                log::debug!("ignoring call for stale scene {:?}", handle);
                None
            }
        }
    }

    fn upload_camera(&self) {
        if let Some(scene) = &self.scene {
            let uniform = CameraUniform {
                view_proj: scene.camera.view_proj().to_cols_array_2d(),
            };
            self.queue.write_buffer(&self.camera_buffer, 0, bytemuck::cast_slice(&[uniform]));
        }
    }

    /// Draws the sphere (if a scene exists) and the egui overlay built by `run_ui`.
    pub fn render_with_ui(
        &mut self,
        window: &Window,
        run_ui: impl FnOnce(&egui::Context),
    ) -> std::result::Result<(), wgpu::SurfaceError> {
        let output = self.surface.get_current_texture()?;
        let view = output.texture.create_view(&wgpu::TextureViewDescriptor::default());

        let mut encoder = self.device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
            label: Some("Render Encoder"),
        });

        {
            let mut render_pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("Sphere Pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: &view,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Clear(wgpu::Color::BLACK),
                        store: true,
                    },
                })],
                depth_stencil_attachment: None,
            });

            if let Some(scene) = &self.scene {
                render_pass.set_pipeline(&self.render_pipeline);
                render_pass.set_bind_group(0, &scene.bind_group, &[]);
                render_pass.set_vertex_buffer(0, self.vertex_buffer.slice(..));
                render_pass.set_index_buffer(self.index_buffer.slice(..), wgpu::IndexFormat::Uint32);
                render_pass.draw_indexed(0..self.index_count, 0, 0..1);
            }
        }

        let raw_input = self.egui_state.take_egui_input(window);
        let full_output = self.egui_ctx.run(raw_input, run_ui);
        self.egui_state
            .handle_platform_output(window, &self.egui_ctx, full_output.platform_output);
        let clipped_primitives = self.egui_ctx.tessellate(full_output.shapes);

        let screen_descriptor = egui_wgpu::renderer::ScreenDescriptor {
            size_in_pixels: [self.config.width, self.config.height],
            pixels_per_point: window.scale_factor() as f32,
        };

        for (id, delta) in &full_output.textures_delta.set {
            self.egui_renderer.update_texture(&self.device, &self.queue, *id, delta);
        }
        self.egui_renderer.update_buffers(
            &self.device,
            &self.queue,
            &mut encoder,
            &clipped_primitives,
            &screen_descriptor,
        );

        {
            let mut render_pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("Egui Render Pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: &view,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Load,
                        store: true,
                    },
                })],
                depth_stencil_attachment: None,
            });
            self.egui_renderer
                .render(&mut render_pass, &clipped_primitives, &screen_descriptor);
        }

        for id in &full_output.textures_delta.free {
            self.egui_renderer.free_texture(id);
        }

        self.queue.submit(std::iter::once(encoder.finish()));
        output.present();
        Ok(())
    }

    /// Reconfigures the surface after it was lost.
    pub fn reconfigure(&mut self) {
        self.surface.configure(&self.device, &self.config);
    }
}

impl Renderer for WgpuRenderer {
    fn max_texture_width(&self) -> Option<u32> {
        self.accelerated
            .then(|| self.device.limits().max_texture_dimension_2d)
    }

    fn create_scene(&mut self, texture: &TextureSource, fov_deg: f32, aspect: f32) -> Result<SceneHandle> {
        let limit = self.device.limits().max_texture_dimension_2d;
        if texture.width > limit || texture.height > limit {
            return Err(ViewerError::Renderer(format!(
                "texture {}x{} exceeds device limit {}",
                texture.width, texture.height, limit
            )));
        }
        let img = texture.decode()?;
        let (width, height) = img.dimensions();
        let texture_size = wgpu::Extent3d {
            width,
            height,
            depth_or_array_layers: 1,
        };

        let gpu_texture = self.device.create_texture(&wgpu::TextureDescriptor {
            size: texture_size,
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: wgpu::TextureFormat::Rgba8UnormSrgb,
            usage: wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
            label: Some("panorama_texture"),
            view_formats: &[],
        });
        self.queue.write_texture(
            wgpu::ImageCopyTexture {
                texture: &gpu_texture,
                mip_level: 0,
                origin: wgpu::Origin3d::ZERO,
                aspect: wgpu::TextureAspect::All,
            },
            &img,
            wgpu::ImageDataLayout {
                offset: 0,
                bytes_per_row: Some(4 * width),
                rows_per_image: Some(height),
            },
            texture_size,
        );

        let texture_view = gpu_texture.create_view(&wgpu::TextureViewDescriptor::default());
        let bind_group = self.device.create_bind_group(&wgpu::BindGroupDescriptor {
            layout: &self.bind_group_layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: self.camera_buffer.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: wgpu::BindingResource::TextureView(&texture_view),
                },
                wgpu::BindGroupEntry {
                    binding: 2,
                    resource: wgpu::BindingResource::Sampler(&self.sampler),
                },
            ],
            label: Some("panorama_bind_group"),
        });

        let handle = SceneHandle(self.next_scene);
        self.next_scene = self.next_scene.wrapping_add(1);
        self.scene = Some(GpuScene {
            handle,
            camera: SphereCamera::new(fov_deg, aspect),
            bind_group,
            _texture: gpu_texture,
        });
        self.upload_camera();
        log::info!("scene {:?} created with {}x{} texture", handle, width, height);
        Ok(handle)
    }

    fn set_field_of_view(&mut self, scene: SceneHandle, fov_deg: f32) {
        if let Some(s) = self.scene_mut(scene) {
            s.camera.fov_deg = fov_deg;
        }
    }

    fn look_at(&mut self, scene: SceneHandle, direction: Vec3) {
        if let Some(s) = self.scene_mut(scene) {
            s.camera.look_at(direction);
        }
    }

    fn render_frame(&mut self, scene: SceneHandle) {
        // the surface is presented from the event loop; only the camera goes out here
        if self.scene_mut(scene).is_some() {
            self.upload_camera();
        }
    }

    fn resize(&mut self, scene: Option<SceneHandle>, width: u32, height: u32) {
        if width == 0 || height == 0 {
            return;
        }
        self.size = winit::dpi::PhysicalSize::new(width, height);
        self.config.width = width;
        self.config.height = height;
        self.surface.configure(&self.device, &self.config);
        if let Some(s) = scene.and_then(|h| self.scene_mut(h)) {
            s.camera.aspect = width as f32 / height as f32;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn camera_handles_looking_straight_up() {
        let mut cam = SphereCamera::new(60.0, 1.5);
        cam.look_at(Vec3::new(1.0, 0.0, 0.0));
        cam.look_at(Vec3::Y);
        let m = cam.view_proj();
        assert!(m.to_cols_array().iter().all(|v| v.is_finite()));
    }

    #[test]
    fn forward_direction_projects_to_screen_center() {
        let mut cam = SphereCamera::new(90.0, 1.0);
        cam.look_at(Vec3::new(0.3, 0.2, 0.9));
        let p = cam.view_proj().project_point3(cam.direction * 100.0);
        assert!(p.x.abs() < 1e-4 && p.y.abs() < 1e-4);
    }

    #[test]
    fn zero_direction_is_ignored() {
        let mut cam = SphereCamera::new(90.0, 1.0);
        cam.look_at(Vec3::ZERO);
        assert_eq!(cam.direction, Vec3::Z);
    }
}
