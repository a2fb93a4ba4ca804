//! Background task implementations
//!
//! Every task is a pure function over its JSON payload: no scene or
//! engine state is touched, which is what makes them safe to run off
//! the main thread.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::WorkerError;

/// Dispatch a task by name
pub fn run_task(task: &str, data: &Value) -> Result<Value, WorkerError> {
    match task {
        "simulateParticles" => simulate_particles(data),
        "findPath" => find_path(data),
        "generateTerrain" => generate_terrain(data),
        other => Err(WorkerError::UnknownTask(other.to_string())),
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct Particle {
    position: [f32; 3],
    velocity: [f32; 3],
}

#[derive(Debug, Deserialize)]
struct ParticlePayload {
    particles: Vec<Particle>,
    dt: f32,
    #[serde(default)]
    gravity: f32,
    #[serde(default = "one")]
    steps: u32,
}

fn one() -> u32 {
    1
}

/// Advance a particle set by `steps` fixed increments of `dt`
fn simulate_particles(data: &Value) -> Result<Value, WorkerError> {
    let mut payload: ParticlePayload =
        serde_json::from_value(data.clone()).map_err(|e| WorkerError::TaskFailed(e.to_string()))?;

    for _ in 0..payload.steps {
        for p in &mut payload.particles {
            p.velocity[1] += payload.gravity * payload.dt;
            for axis in 0..3 {
                p.position[axis] += p.velocity[axis] * payload.dt;
            }
        }
    }

    serde_json::to_value(payload.particles).map_err(|e| WorkerError::TaskFailed(e.to_string()))
}

#[derive(Debug, Deserialize)]
struct PathPayload {
    /// Row-major walkability grid; `true` = passable
    grid: Vec<Vec<bool>>,
    start: [usize; 2],
    goal: [usize; 2],
}

/// Breadth-first shortest path over a walkability grid
///
/// Returns the cell list start..=goal, or an error when no path exists.
fn find_path(data: &Value) -> Result<Value, WorkerError> {
    let payload: PathPayload =
        serde_json::from_value(data.clone()).map_err(|e| WorkerError::TaskFailed(e.to_string()))?;

    let rows = payload.grid.len();
    let cols = payload.grid.first().map_or(0, Vec::len);
    let in_bounds = |r: usize, c: usize| r < rows && c < cols;
    if !in_bounds(payload.start[0], payload.start[1]) || !in_bounds(payload.goal[0], payload.goal[1])
    {
        return Err(WorkerError::TaskFailed(
            "start or goal outside grid".to_string(),
        ));
    }

    let mut prev = vec![vec![None::<[usize; 2]>; cols]; rows];
    let mut visited = vec![vec![false; cols]; rows];
    let mut queue = std::collections::VecDeque::new();
    visited[payload.start[0]][payload.start[1]] = true;
    queue.push_back(payload.start);

    while let Some([r, c]) = queue.pop_front() {
        if [r, c] == payload.goal {
            let mut path = vec![[r, c]];
            let mut cursor = [r, c];
            while let Some(p) = prev[cursor[0]][cursor[1]] {
                path.push(p);
                cursor = p;
            }
            path.reverse();
            return serde_json::to_value(path)
                .map_err(|e| WorkerError::TaskFailed(e.to_string()));
        }

        let neighbors = [
            (r.wrapping_sub(1), c),
            (r + 1, c),
            (r, c.wrapping_sub(1)),
            (r, c + 1),
        ];
        for (nr, nc) in neighbors {
            if in_bounds(nr, nc) && payload.grid[nr][nc] && !visited[nr][nc] {
                visited[nr][nc] = true;
                prev[nr][nc] = Some([r, c]);
                queue.push_back([nr, nc]);
            }
        }
    }

    Err(WorkerError::TaskFailed("no path found".to_string()))
}

#[derive(Debug, Deserialize)]
struct TerrainPayload {
    width: usize,
    depth: usize,
    #[serde(default = "default_amplitude")]
    amplitude: f32,
    #[serde(default)]
    seed: u32,
}

fn default_amplitude() -> f32 {
    1.0
}

/// Deterministic value-noise heightmap
fn generate_terrain(data: &Value) -> Result<Value, WorkerError> {
    let payload: TerrainPayload =
        serde_json::from_value(data.clone()).map_err(|e| WorkerError::TaskFailed(e.to_string()))?;

    if payload.width == 0 || payload.depth == 0 {
        return Err(WorkerError::TaskFailed("empty terrain dimensions".to_string()));
    }

    let hash = |x: u32, z: u32| -> f32 {
        let mut h = x
            .wrapping_mul(0x85eb_ca6b)
            .wrapping_add(z.wrapping_mul(0xc2b2_ae35))
            .wrapping_add(payload.seed);
        h ^= h >> 13;
        h = h.wrapping_mul(0x27d4_eb2f);
        h ^= h >> 15;
        (h as f32 / u32::MAX as f32) * 2.0 - 1.0
    };

    let lerp = |a: f32, b: f32, t: f32| a + (b - a) * t;

    let mut heights = Vec::with_capacity(payload.depth);
    for z in 0..payload.depth {
        let mut row = Vec::with_capacity(payload.width);
        for x in 0..payload.width {
            // Two octaves of value noise on a coarse lattice.
            let mut height = 0.0;
            let mut freq = 0.25;
            let mut amp = payload.amplitude;
            for _ in 0..2 {
                let fx = x as f32 * freq;
                let fz = z as f32 * freq;
                let (x0, z0) = (fx.floor() as u32, fz.floor() as u32);
                let (tx, tz) = (fx.fract(), fz.fract());
                let h00 = hash(x0, z0);
                let h10 = hash(x0 + 1, z0);
                let h01 = hash(x0, z0 + 1);
                let h11 = hash(x0 + 1, z0 + 1);
                height += lerp(lerp(h00, h10, tx), lerp(h01, h11, tx), tz) * amp;
                freq *= 2.0;
                amp *= 0.5;
            }
            row.push(height);
        }
        heights.push(row);
    }

    serde_json::to_value(heights).map_err(|e| WorkerError::TaskFailed(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn particles_integrate_velocity() {
        let result = run_task(
            "simulateParticles",
            &json!({
                "particles": [{"position": [0.0, 0.0, 0.0], "velocity": [1.0, 0.0, 0.0]}],
                "dt": 0.5,
                "steps": 4
            }),
        )
        .unwrap();
        let x = result[0]["position"][0].as_f64().unwrap();
        assert!((x - 2.0).abs() < 1e-5);
    }

    #[test]
    fn path_routes_around_walls() {
        let result = run_task(
            "findPath",
            &json!({
                "grid": [
                    [true,  true,  true],
                    [false, false, true],
                    [true,  true,  true]
                ],
                "start": [0, 0],
                "goal": [2, 0]
            }),
        )
        .unwrap();
        let path: Vec<[usize; 2]> = serde_json::from_value(result).unwrap();
        assert_eq!(path.first(), Some(&[0, 0]));
        assert_eq!(path.last(), Some(&[2, 0]));
        // Forced through the open right-hand column.
        assert!(path.contains(&[1, 2]));
    }

    #[test]
    fn path_failure_is_an_error() {
        let err = run_task(
            "findPath",
            &json!({
                "grid": [[true, false], [false, true]],
                "start": [0, 0],
                "goal": [1, 1]
            }),
        )
        .unwrap_err();
        assert!(matches!(err, WorkerError::TaskFailed(_)));
    }

    #[test]
    fn terrain_is_deterministic_for_a_seed() {
        let payload = json!({"width": 8, "depth": 8, "seed": 7});
        let a = run_task("generateTerrain", &payload).unwrap();
        let b = run_task("generateTerrain", &payload).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn unknown_task_is_rejected() {
        let err = run_task("meltGpu", &json!({})).unwrap_err();
        assert!(matches!(err, WorkerError::UnknownTask(name) if name == "meltGpu"));
    }
}
