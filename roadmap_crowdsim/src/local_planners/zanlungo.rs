use crate::local_planners::local_planner::LocalPlanner;
use crate::map_representation::map::Map;
use crate::Agent;
use crate::AgentId;
use crate::Vec2f;

use std::collections::HashMap;

/// Upper bound on a single agent-agent force.
const MAX_FORCE: f64 = 1e15;

/// Shortest time horizon used when dividing by the time to collision.
const MIN_COLLISION_TIME: f64 = 1e-3;

/// Social-force avoidance after Zanlungo et al.
///
/// Every agent extrapolates itself and its neighbours to the moment of the
/// first predicted collision and is pushed away from where they will be.
/// Priorities decide right of way: the agent with the lower priority yields
/// and steers around the other's preferred path. Obstacles the agent would
/// reach within its obstacle time horizon push back against the approach.
pub struct Zanlungo {
    agent_scale: f64,
    obstacle_scale: f64,
    force_distance: f64,
    agent_mass: f64,
    agent_priorities: HashMap<AgentId, f64>,
}

/// Computes the spherical linear interpolation between two vectors
/// the result is (conceptually) (1-t)*p0 + t*p1
/// sin_theta is the sine of the angle between p0 and p1
fn slerp(t: f64, p0: &Vec2f, p1: &Vec2f, sin_theta: f64) -> Vec2f {
    if sin_theta.abs() < 1e-9 {
        return p0 * (1f64 - t) + p1 * t;
    }
    let theta = sin_theta.asin();
    let t0 = ((1f64 - t) * theta).sin() / sin_theta;
    let t1 = (t * theta).sin() / sin_theta;
    p0 * t0 + p1 * t1
}

/// Earliest time at which two discs separated by `rel_pos` and moving at
/// `rel_vel` touch. Zero if they already overlap.
fn time_to_collision(rel_vel: &Vec2f, rel_pos: &Vec2f, combined_radius: f64) -> f64 {
    let c = rel_pos.norm_squared() - combined_radius * combined_radius;
    if c < 0f64 {
        return 0f64;
    }

    let a = rel_vel.norm_squared();
    if a == 0f64 {
        return f64::INFINITY;
    }

    let b = 2f64 * rel_vel.dot(rel_pos);
    let discriminant = b * b - 4f64 * a * c;
    if discriminant < 0f64 {
        return f64::INFINITY;
    }

    // With c >= 0 both roots share a sign; negative roots lie in the past.
    let t0 = (-b - discriminant.sqrt()) / (2f64 * a);
    if t0 > 0f64 {
        t0
    } else {
        f64::INFINITY
    }
}

impl Zanlungo {
    pub fn new(agent_scale: f64, obstacle_scale: f64, force_distance: f64, agent_mass: f64) -> Self {
        Zanlungo {
            agent_scale,
            obstacle_scale,
            force_distance,
            agent_mass,
            agent_priorities: HashMap::new(),
        }
    }

    /// Overrides an agent's priority. Unset agents use their id.
    pub fn set_priority(&mut self, agent: AgentId, priority: f64) {
        self.agent_priorities.insert(agent, priority);
    }

    fn priority(&self, agent: AgentId) -> f64 {
        self.agent_priorities
            .get(&agent)
            .copied()
            .unwrap_or(agent as f64)
    }

    /// Computes the time to the first collision
    pub fn compute_tti(&self, current_agent: &Agent, nearby_agents: &[Agent]) -> f64 {
        nearby_agents
            .iter()
            .map(|n| {
                time_to_collision(
                    &(n.velocity - current_agent.velocity),
                    &(n.position - current_agent.position),
                    n.radius + current_agent.radius,
                )
            })
            .fold(f64::INFINITY, f64::min)
    }

    /// Velocities the two agents are assumed to keep, adjusted for right of
    /// way, plus the signed right-of-way weight of `agent` over `other`.
    fn right_of_way_vel(&self, agent: &Agent, other: &Agent) -> (f64, Vec2f, Vec2f) {
        let right_of_way = (self.priority(agent.agent_id) - self.priority(other.agent_id))
            .clamp(-1f64, 1f64);
        if right_of_way < 0f64 {
            let r_2 = (-right_of_way).sqrt();
            let other_vel = other.velocity + r_2 * (other.preferred_vel - other.velocity);
            (-r_2, agent.velocity, other_vel)
        } else if right_of_way > 0f64 {
            let r_2 = right_of_way.sqrt();
            let vel = agent.velocity + r_2 * (agent.preferred_vel - agent.velocity);
            (r_2, vel, other.velocity)
        } else {
            (0f64, agent.velocity, other.velocity)
        }
    }

    fn compute_agent_force(&self, agent: &Agent, other: &Agent, t_i: f64) -> Vec2f {
        let (right_of_way, my_vel, other_vel) = self.right_of_way_vel(agent, other);
        // In [0, 2]; above 1 the other agent has right of way.
        let weight = 1f64 - right_of_way;
        if weight == 0f64 {
            return Vec2f::zeros();
        }

        let fut_pos = agent.position + my_vel * t_i;
        let other_future_pos = other.position + other_vel * t_i;
        let mut d_ij = fut_pos - other_future_pos;
        let dist = d_ij.norm();

        // Agents that drift apart do not repel.
        if dist > (agent.position - other.position).norm() {
            return Vec2f::zeros();
        }

        if weight > 1f64 {
            let pref_speed = other.preferred_vel.norm();
            let perp_dir = if pref_speed < 0.0001f64 {
                // It wants to stand still: sidestep across the displacement.
                let curr_rel_pos = agent.position - other.position;
                let perp = Vec2f::new(-curr_rel_pos.y, curr_rel_pos.x);
                Some(if perp.dot(&agent.velocity) < 0f64 { -perp } else { perp })
            } else if other.preferred_vel.dot(&d_ij) > 0f64 {
                // Step off its preferred line of travel.
                let pref_dir = other.preferred_vel;
                let perp = Vec2f::new(-pref_dir.y, pref_dir.x);
                Some(if perp.dot(&d_ij) < 0f64 { -perp } else { perp })
            } else {
                None
            };

            if let Some(perp_dir) = perp_dir {
                let sin_theta = (perp_dir.x * d_ij.y - perp_dir.y * d_ij.x).abs().min(1f64);
                d_ij = slerp(weight - 1f64, &d_ij, &perp_dir, sin_theta);
            }
        }

        if d_ij.norm_squared() == 0f64 {
            return Vec2f::zeros();
        }

        let surface_dist = dist - (agent.radius + other.radius);
        let magnitude = (weight * self.agent_scale * (my_vel - other_vel).norm()
            / t_i.max(MIN_COLLISION_TIME))
        .min(MAX_FORCE);

        d_ij.normalize() * (magnitude * (-surface_dist / self.force_distance).exp())
    }

    /// Push away from the nearest obstacle, proportional to how fast
    /// `velocity` closes in on it. Zero unless the agent's clearance would
    /// be used up within `time_horizon_obstacles`.
    fn compute_obstacle_force<M: Map>(&self, agent: &Agent, velocity: &Vec2f, map: &M) -> Vec2f {
        let lookahead = agent.radius + agent.max_speed * agent.time_horizon_obstacles;
        let nearest = match map.nearest_obstacle(agent.position, lookahead) {
            Some(nearest) => nearest,
            None => return Vec2f::zeros(),
        };
        let away = agent.position - nearest;
        let dist = away.norm();
        if dist == 0f64 {
            return Vec2f::zeros();
        }
        let normal = away / dist;
        let approach = -velocity.dot(&normal);
        if approach <= 0f64 {
            return Vec2f::zeros();
        }
        let surface_dist = (dist - agent.radius).max(0f64);
        if surface_dist > approach * agent.time_horizon_obstacles {
            return Vec2f::zeros();
        }
        normal
            * (self.obstacle_scale * approach * (-surface_dist / self.force_distance).exp())
                .min(MAX_FORCE)
    }
}

impl<M: Map> LocalPlanner<M> for Zanlungo {
    fn get_desired_velocity(
        &self,
        agent: &Agent,
        nearby_agents: &[Agent],
        recommended_velocity: Vec2f,
        map: &M,
    ) -> Vec2f {
        let t_i = self.compute_tti(agent, nearby_agents);

        let mut force = Vec2f::zeros();
        if t_i.is_finite() {
            for nearby_agent in nearby_agents {
                force += self.compute_agent_force(agent, nearby_agent, t_i);
            }
        }
        let velocity = recommended_velocity + force * (1f64 / self.agent_mass);
        velocity + self.compute_obstacle_force(agent, &velocity, map) * (1f64 / self.agent_mass)
    }
}
