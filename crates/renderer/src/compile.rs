use std::borrow::Cow;
use std::path::{Path, PathBuf};

use anyhow::{anyhow, bail, Context, Result};
use wgpu::naga::front::glsl::{Frontend, Options};
use wgpu::naga::ShaderStage;

use crate::binder::UNIFORM_NAMES;

/// A user shader that has been read, wrapped and accepted by naga's GLSL
/// frontend. Creating one is the startup check for the windowed path.
#[derive(Debug, Clone)]
pub struct PreparedShader {
    pub path: PathBuf,
    pub wrapped: String,
}

impl PreparedShader {
    pub fn load(path: &Path) -> Result<Self> {
        let source = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read shader at {}", path.display()))?;
        Self::from_source(path, &source)
    }

    pub fn from_source(path: &Path, source: &str) -> Result<Self> {
        if !source.contains("mainImage") {
            bail!(
                "shader {} does not define mainImage(out vec4, in vec2)",
                path.display()
            );
        }
        let wrapped = wrap_fragment(source);
        validate_glsl(&wrapped, ShaderStage::Fragment)
            .with_context(|| format!("shader {} failed to compile", path.display()))?;
        tracing::debug!(shader = %path.display(), bytes = wrapped.len(), "validated fragment shader");
        Ok(Self {
            path: path.to_path_buf(),
            wrapped,
        })
    }
}

/// Parses GLSL with naga and reports every diagnostic against the source.
pub(crate) fn validate_glsl(source: &str, stage: ShaderStage) -> Result<()> {
    let mut frontend = Frontend::default();
    frontend
        .parse(&Options::from(stage), source)
        .map(|_| ())
        .map_err(|errors| anyhow!(errors.emit_to_string(source)))
}

/// Compiles the static full-screen triangle vertex shader.
pub(crate) fn compile_vertex_shader(device: &wgpu::Device) -> Result<wgpu::ShaderModule> {
    create_module(
        device,
        "fullscreen triangle vertex",
        Cow::Borrowed(VERTEX_SHADER_GLSL),
        ShaderStage::Vertex,
    )
}

pub(crate) fn compile_fragment_shader(
    device: &wgpu::Device,
    shader: &PreparedShader,
) -> Result<wgpu::ShaderModule> {
    create_module(
        device,
        "reactive box fragment",
        Cow::Owned(shader.wrapped.clone()),
        ShaderStage::Fragment,
    )
    .with_context(|| format!("GPU rejected shader {}", shader.path.display()))
}

fn create_module(
    device: &wgpu::Device,
    label: &str,
    source: Cow<'static, str>,
    stage: ShaderStage,
) -> Result<wgpu::ShaderModule> {
    device.push_error_scope(wgpu::ErrorFilter::Validation);
    let module = device.create_shader_module(wgpu::ShaderModuleDescriptor {
        label: Some(label),
        source: wgpu::ShaderSource::Glsl {
            shader: source,
            stage,
            defines: &[],
        },
    });
    if let Some(err) = pollster::block_on(device.pop_error_scope()) {
        bail!("{label}: {err}");
    }
    Ok(module)
}

/// Produces a self-contained GLSL fragment shader from user code.
///
/// 1. Strip `#version` and any `uniform` declaration of a name we provide.
/// 2. Prepend [`HEADER`], which declares the uniform block and maps each
///    uniform name onto its block member.
/// 3. Append [`FOOTER`], which flips to a bottom-left origin and calls
///    `mainImage`.
pub(crate) fn wrap_fragment(source: &str) -> String {
    let mut sanitized = String::with_capacity(source.len());
    let mut skipped_version = false;
    for line in source.lines() {
        let trimmed = line.trim_start();
        if !skipped_version && trimmed.starts_with("#version") {
            skipped_version = true;
            sanitized.push('\n');
            continue;
        }
        // Removed lines become blank so `#line 1` keeps diagnostics aligned.
        match filter_uniform_line(line) {
            UniformLine::Keep => sanitized.push_str(line),
            UniformLine::Drop => {}
            UniformLine::Rewrite(kept) => sanitized.push_str(&kept),
        }
        sanitized.push('\n');
    }

    format!("{HEADER}\n#line 1\n{sanitized}{FOOTER}")
}

#[derive(Debug, PartialEq, Eq)]
enum UniformLine {
    Keep,
    Drop,
    /// Declaration with the provided names taken out.
    Rewrite(String),
}

fn is_provided(name: &str) -> bool {
    UNIFORM_NAMES.contains(&name)
}

fn identifiers(text: &str) -> impl Iterator<Item = &str> {
    text.split(|c: char| !(c.is_ascii_alphanumeric() || c == '_'))
        .filter(|token| !token.is_empty())
}

/// Decides what happens to one source line given the uniforms the header
/// already provides. A declaration naming several uniforms keeps the user's
/// own names: `uniform float uTime, knob;` becomes `uniform float knob;`.
fn filter_uniform_line(line: &str) -> UniformLine {
    let trimmed = line.trim_start();
    let Some(rest) = trimmed.strip_prefix("uniform ") else {
        return UniformLine::Keep;
    };
    let Some((body, tail)) = rest.split_once(';') else {
        // Declaration continues on the next line; only the whole-line form is handled.
        return if identifiers(rest).any(is_provided) {
            UniformLine::Drop
        } else {
            UniformLine::Keep
        };
    };

    let mut pieces = body.split(',');
    let first = pieces.next().unwrap_or_default().trim_end();
    let Some(split) = first.rfind(char::is_whitespace) else {
        return UniformLine::Keep;
    };
    let ty = first[..split].trim();
    let declarators: Vec<&str> = std::iter::once(first[split..].trim())
        .chain(pieces.map(str::trim))
        .collect();
    let kept: Vec<&str> = declarators
        .iter()
        .copied()
        .filter(|declarator| !identifiers(declarator).next().is_some_and(is_provided))
        .collect();

    if kept.len() == declarators.len() {
        return UniformLine::Keep;
    }
    let indent = &line[..line.len() - trimmed.len()];
    if kept.is_empty() {
        return match tail.trim() {
            "" => UniformLine::Drop,
            rest => UniformLine::Rewrite(format!("{indent}{rest}")),
        };
    }
    UniformLine::Rewrite(format!("{indent}uniform {ty} {};{tail}", kept.join(", ")))
}

/// GLSL prologue injected ahead of every fragment shader.
///
/// The block layout must match `gpu::uniforms::ReactiveBoxUniforms`.
const HEADER: &str = r"#version 450
layout(location = 0) in vec2 v_uv;
layout(location = 0) out vec4 outColor;

layout(std140, set = 0, binding = 0) uniform ReactiveBoxParams {
    vec2 _uTilt;
    vec2 _resolution;
    float _uTime;
    float _uEdgeThickness;
    float _uRimIntensity;
    float _uFaceBrightness;
    float _uAOStrength;
    float _uAORadius;
    float _uSpecularPower;
    float _uNoiseStrength;
    vec4 _uNeonLineColor;
    vec4 _uHighlightColor;
    vec4 _uColorBox;
    vec4 _uColorTopLight;
    vec4 _uColorTopDark;
    vec4 _uColorBottomLight;
    vec4 _uColorBottomDark;
    vec4 _uColorLeftLight;
    vec4 _uColorLeftDark;
    vec4 _uColorRightLight;
    vec4 _uColorRightDark;
} ubo;

#define uTilt ubo._uTilt
#define resolution ubo._resolution
#define uTime ubo._uTime
#define uEdgeThickness ubo._uEdgeThickness
#define uRimIntensity ubo._uRimIntensity
#define uFaceBrightness ubo._uFaceBrightness
#define uAOStrength ubo._uAOStrength
#define uAORadius ubo._uAORadius
#define uSpecularPower ubo._uSpecularPower
#define uNoiseStrength ubo._uNoiseStrength
#define uNeonLineColor ubo._uNeonLineColor.rgb
#define uHighlightColor ubo._uHighlightColor.rgb
#define uColorBox ubo._uColorBox.rgb
#define uColorTopLight ubo._uColorTopLight.rgb
#define uColorTopDark ubo._uColorTopDark.rgb
#define uColorBottomLight ubo._uColorBottomLight.rgb
#define uColorBottomDark ubo._uColorBottomDark.rgb
#define uColorLeftLight ubo._uColorLeftLight.rgb
#define uColorLeftDark ubo._uColorLeftDark.rgb
#define uColorRightLight ubo._uColorRightLight.rgb
#define uColorRightDark ubo._uColorRightDark.rgb
";

/// GLSL epilogue: bottom-left origin, then `mainImage`.
const FOOTER: &str = r"
void main() {
    vec2 fragCoord = vec2(gl_FragCoord.x, resolution.y - gl_FragCoord.y);
    vec4 color = vec4(0.0);
    mainImage(color, fragCoord);
    outColor = vec4(color.rgb, 1.0);
}
";

/// Minimal full-screen triangle vertex shader.
const VERTEX_SHADER_GLSL: &str = r"#version 450
layout(location = 0) out vec2 v_uv;

const vec2 positions[3] = vec2[3](
    vec2(-1.0, -3.0),
    vec2(3.0, 1.0),
    vec2(-1.0, 1.0)
);

void main() {
    uint vertex_index = uint(gl_VertexIndex);
    vec2 pos = positions[vertex_index];
    v_uv = pos * 0.5 + vec2(0.5, 0.5);
    gl_Position = vec4(pos, 0.0, 1.0);
}
";
