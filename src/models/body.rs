use crate::models::common::Vector3;
use crate::models::traits::{BodyConstraints, IRigidBody};

/// プロセス内で完結する簡易剛体
///
/// ヘッドレス実行とテスト用の物理エンジン代替です。
/// 線形減衰付きの等速運動のみを扱い、衝突は扱いません。
/// 書き込み回数を記録するので、物理書き込みの冪等性をテストで確認できます。
#[derive(Debug, Clone)]
pub struct SimRigidBody {
    pub position: Vector3,
    pub velocity: Vector3,
    pub angular_velocity: Vector3,
    pub constraints: BodyConstraints,
    /// 質量（kg）
    pub mass: f64,
    /// 線形減衰係数（1/s）
    pub linear_damping: f64,
    /// 速度・拘束・撃力の書き込み回数
    pub write_count: u32,
    /// 受けた撃力の履歴
    pub impulses: Vec<Vector3>,
}

impl SimRigidBody {
    pub fn new(position: Vector3) -> Self {
        Self {
            position,
            velocity: Vector3::ZERO,
            angular_velocity: Vector3::ZERO,
            constraints: BodyConstraints::Free,
            mass: 1.0,
            linear_damping: 0.0,
            write_count: 0,
            impulses: Vec::new(),
        }
    }

    pub fn with_mass(mut self, mass: f64) -> Self {
        self.mass = mass.max(1e-3);
        self
    }

    pub fn with_damping(mut self, linear_damping: f64) -> Self {
        self.linear_damping = linear_damping.max(0.0);
        self
    }

    fn constrain(&self, v: Vector3) -> Vector3 {
        match self.constraints {
            BodyConstraints::Free => v,
            BodyConstraints::LockedHorizontalAndRotation => Vector3::new(0.0, v.y, 0.0),
        }
    }
}

impl IRigidBody for SimRigidBody {
    fn position(&self) -> Vector3 {
        self.position
    }

    fn set_position(&mut self, position: Vector3) {
        self.position = position;
    }

    fn velocity(&self) -> Vector3 {
        self.velocity
    }

    fn set_velocity(&mut self, velocity: Vector3) {
        self.velocity = self.constrain(velocity);
        self.write_count += 1;
    }

    fn set_angular_velocity(&mut self, angular_velocity: Vector3) {
        self.angular_velocity = match self.constraints {
            BodyConstraints::Free => angular_velocity,
            BodyConstraints::LockedHorizontalAndRotation => Vector3::ZERO,
        };
        self.write_count += 1;
    }

    fn constraints(&self) -> BodyConstraints {
        self.constraints
    }

    fn set_constraints(&mut self, constraints: BodyConstraints) {
        self.constraints = constraints;
        if constraints == BodyConstraints::LockedHorizontalAndRotation {
            self.velocity = self.constrain(self.velocity);
            self.angular_velocity = Vector3::ZERO;
        }
        self.write_count += 1;
    }

    fn add_impulse(&mut self, impulse: Vector3) {
        self.impulses.push(impulse);
        self.velocity = self.constrain(self.velocity + impulse * (1.0 / self.mass));
        self.write_count += 1;
    }

    fn integrate(&mut self, dt: f64) {
        self.velocity = self.constrain(self.velocity);
        self.position += self.velocity * dt;
        let decay = (1.0 - self.linear_damping * dt).max(0.0);
        self.velocity = self.velocity * decay;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_impulse_scales_by_mass() {
        let mut body = SimRigidBody::new(Vector3::ZERO).with_mass(2.0);
        body.add_impulse(Vector3::planar(10.0, 0.0));
        assert_eq!(body.velocity(), Vector3::planar(5.0, 0.0));
        assert_eq!(body.impulses.len(), 1);
    }

    #[test]
    fn test_locked_body_does_not_move_horizontally() {
        let mut body = SimRigidBody::new(Vector3::ZERO);
        body.set_constraints(BodyConstraints::LockedHorizontalAndRotation);
        body.add_impulse(Vector3::planar(4.0, 4.0));
        body.integrate(0.1);
        assert_eq!(body.position(), Vector3::ZERO);
    }

    #[test]
    fn test_integrate_applies_damping() {
        let mut body = SimRigidBody::new(Vector3::ZERO).with_damping(1.0);
        body.set_velocity(Vector3::planar(1.0, 0.0));
        body.integrate(0.5);
        assert!((body.position().x - 0.5).abs() < 1e-12);
        assert!((body.velocity().x - 0.5).abs() < 1e-12);
    }
}
