//! WGSL sources. Every kernel is compiled as `PRELUDE_WGSL` followed by its
//! body, so the atlas mapping is written once per device.

pub const PRELUDE_WGSL: &str = r#"
struct Params {
  particle_count: u32,
  field_radius: u32,
  tiles: u32,
  atlas_size: u32,
  texel_count: u32,
  bilinear: u32,
  _pad0: u32,
  _pad1: u32,
  swirl: f32,
  gradient: f32,
  gravity: f32,
  force_scale: f32,
  inertia_damping: f32,
  field_coupling: f32,
  splat_weight: f32,
  diffusion_decay: f32,
  fixed_scale: f32,
  _pad2: f32,
  _pad3: f32,
  _pad4: f32,
};
@group(0) @binding(0) var<uniform> p: Params;

// 2D dispatch flattened to one index; rows are num_workgroups.x * 64 wide.
fn flat_index(gid: vec3<u32>, groups: vec3<u32>) -> u32 {
  return gid.x + gid.y * groups.x * 64u;
}

fn to_atlas(pos: vec3<f32>) -> vec2<f32> {
  let tiles = i32(p.tiles);
  let s = i32(floor(pos.z * f32(p.field_radius)));
  let zf = ((s % tiles) + tiles) % tiles;
  let zi = (s - zf) / tiles;
  return (vec2<f32>(f32(zf), f32(zi)) + pos.xy) / f32(p.tiles) + vec2<f32>(0.5 / f32(p.atlas_size));
}

fn texel_of_uv(uv: vec2<f32>) -> u32 {
  let last = i32(p.atlas_size) - 1;
  let t = clamp(vec2<i32>(floor(uv * f32(p.atlas_size))), vec2<i32>(0), vec2<i32>(last));
  return u32(t.y) * p.atlas_size + u32(t.x);
}

fn cell_of_texel(t: u32) -> vec3<u32> {
  let tx = t % p.atlas_size;
  let ty = t / p.atlas_size;
  let f = p.field_radius;
  return vec3<u32>(tx % f, ty % f, (ty / f) * p.tiles + tx / f);
}

fn texel_of_cell(c: vec3<u32>) -> u32 {
  let f = p.field_radius;
  let tx = (c.z % p.tiles) * f + c.x;
  let ty = (c.z / p.tiles) * f + c.y;
  return ty * p.atlas_size + tx;
}
"#;

pub const SPLAT_SCATTER_WGSL: &str = r#"
@group(0) @binding(1) var<storage, read> current: array<vec4<f32>>;
@group(0) @binding(2) var<storage, read> previous: array<vec4<f32>>;
@group(0) @binding(3) var<storage, read_write> accum: array<atomic<i32>>;

fn quantize(x: f32) -> i32 { return i32(round(x * p.fixed_scale)); }

@compute @workgroup_size(64)
fn main(@builtin(global_invocation_id) gid: vec3<u32>, @builtin(num_workgroups) groups: vec3<u32>) {
  let i = flat_index(gid, groups);
  if (i >= p.particle_count) { return; }
  let pos = current[i].xyz;
  let v = pos - previous[i].xyz;
  let first = texel_of_uv(to_atlas(pos - floor(pos))) * 4u;
  atomicAdd(&accum[first], quantize(v.x));
  atomicAdd(&accum[first + 1u], quantize(v.y));
  atomicAdd(&accum[first + 2u], quantize(v.z));
  atomicAdd(&accum[first + 3u], 1);
}
"#;

pub const SPLAT_RESOLVE_WGSL: &str = r#"
@group(0) @binding(1) var<storage, read_write> accum: array<atomic<i32>>;
@group(0) @binding(2) var<storage, read_write> field: array<vec4<f32>>;

@compute @workgroup_size(64)
fn main(@builtin(global_invocation_id) gid: vec3<u32>, @builtin(num_workgroups) groups: vec3<u32>) {
  let t = flat_index(gid, groups);
  if (t >= p.texel_count) { return; }
  let first = t * 4u;
  let x = atomicExchange(&accum[first], 0);
  let y = atomicExchange(&accum[first + 1u], 0);
  let z = atomicExchange(&accum[first + 2u], 0);
  let n = atomicExchange(&accum[first + 3u], 0);
  if (x == 0 && y == 0 && z == 0 && n == 0) { return; }
  let v = vec3<f32>(f32(x), f32(y), f32(z)) / p.fixed_scale;
  field[t] = field[t] + vec4<f32>(v, f32(n) * p.splat_weight);
}
"#;

pub const DIFFUSE_WGSL: &str = r#"
@group(0) @binding(1) var<storage, read> src: array<vec4<f32>>;
@group(0) @binding(2) var<storage, read_write> dst: array<vec4<f32>>;

fn read_cell(c: vec3<i32>, d: vec3<i32>) -> vec4<f32> {
  let hi = vec3<i32>(i32(p.field_radius) - 1);
  let at = clamp(c + d, vec3<i32>(1), hi);
  return src[texel_of_cell(vec3<u32>(at))];
}

@compute @workgroup_size(64)
fn main(@builtin(global_invocation_id) gid: vec3<u32>, @builtin(num_workgroups) groups: vec3<u32>) {
  let t = flat_index(gid, groups);
  if (t >= p.texel_count) { return; }
  let c = vec3<i32>(cell_of_texel(t));
  var sum = vec4<f32>(0.0);
  sum = sum + read_cell(c, vec3<i32>(-1, 0, 0));
  sum = sum + read_cell(c, vec3<i32>(1, 0, 0));
  sum = sum + read_cell(c, vec3<i32>(0, -1, 0));
  sum = sum + read_cell(c, vec3<i32>(0, 1, 0));
  sum = sum + read_cell(c, vec3<i32>(0, 0, -1));
  sum = sum + read_cell(c, vec3<i32>(0, 0, 1));
  dst[t] = p.diffusion_decay * (sum * (1.0 / 12.0) + 0.5 * read_cell(c, vec3<i32>(0)));
}
"#;

pub const ADVECT_WGSL: &str = r#"
@group(0) @binding(1) var<storage, read> pos0: array<vec4<f32>>;
@group(0) @binding(2) var<storage, read> pos1: array<vec4<f32>>;
@group(0) @binding(3) var<storage, read> field: array<vec4<f32>>;
@group(0) @binding(4) var<storage, read_write> next: array<vec4<f32>>;

fn texel_at(x: i32, y: i32) -> vec4<f32> {
  let last = i32(p.atlas_size) - 1;
  let cx = u32(clamp(x, 0, last));
  let cy = u32(clamp(y, 0, last));
  return field[cy * p.atlas_size + cx];
}

fn sample_field(q: vec3<f32>) -> vec4<f32> {
  let uv = to_atlas(q);
  if (p.bilinear == 0u) {
    return field[texel_of_uv(uv)];
  }
  let coord = uv * f32(p.atlas_size) - vec2<f32>(0.5);
  let origin = floor(coord);
  let t = coord - origin;
  let x0 = i32(origin.x);
  let y0 = i32(origin.y);
  let bottom = mix(texel_at(x0, y0), texel_at(x0 + 1, y0), t.x);
  let top = mix(texel_at(x0, y0 + 1), texel_at(x0 + 1, y0 + 1), t.x);
  return mix(bottom, top, t.y);
}

fn scalar_gradient(q: vec3<f32>) -> vec3<f32> {
  let dx = 1.0 / f32(p.field_radius);
  return vec3<f32>(
    sample_field(q + vec3<f32>(dx, 0.0, 0.0)).w - sample_field(q - vec3<f32>(dx, 0.0, 0.0)).w,
    sample_field(q + vec3<f32>(0.0, dx, 0.0)).w - sample_field(q - vec3<f32>(0.0, dx, 0.0)).w,
    sample_field(q + vec3<f32>(0.0, 0.0, dx)).w - sample_field(q - vec3<f32>(0.0, 0.0, dx)).w) / dx;
}

fn external_force(q: vec3<f32>) -> vec3<f32> {
  return p.swirl * vec3<f32>(0.5 - q.z, 0.0, q.x - 0.5)
    - p.gradient * scalar_gradient(q)
    - p.gravity * vec3<f32>(0.0, 1.0, 0.0);
}

fn inside(q: vec3<f32>, lo: vec3<f32>, hi: vec3<f32>) -> vec3<bool> {
  return (q >= lo) & (q <= hi);
}

@compute @workgroup_size(64)
fn main(@builtin(global_invocation_id) gid: vec3<u32>, @builtin(num_workgroups) groups: vec3<u32>) {
  let i = flat_index(gid, groups);
  if (i >= p.particle_count) { return; }
  let p0 = pos0[i].xyz;
  let p1 = pos1[i].xyz;

  let field_velocity = sample_field(p0).xyz;
  let v = p.inertia_damping * mix(p0 - p1, field_velocity, p.field_coupling);
  let f = p.force_scale * external_force(p0);
  let proposed = p0 + v + f;

  let dx = 1.0 / f32(p.field_radius);
  let lo = vec3<f32>(dx);
  let hi = vec3<f32>(1.0 - dx);
  var q = select(2.0 * p0 - proposed, proposed, inside(proposed, lo, hi));
  q = select(p1, q, inside(q, lo, hi));
  next[i] = vec4<f32>(clamp(q, lo, hi), 1.0);
}
"#;
