use std::ops::{Add, AddAssign, Mul, Sub};

/// ゼロベクトル判定に使う長さの閾値
pub const EPSILON: f64 = 1e-6;

/// 3次元ベクトル（位置・速度・方向）
///
/// 座標系は y 軸が上方向で、移動と向きは x-z 平面（水平面）で扱います。
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Vector3 {
    pub x: f64, // m
    pub y: f64, // m (高さ)
    pub z: f64, // m
}

impl Vector3 {
    pub const ZERO: Vector3 = Vector3 { x: 0.0, y: 0.0, z: 0.0 };
    pub const FORWARD: Vector3 = Vector3 { x: 0.0, y: 0.0, z: 1.0 };

    pub fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }

    /// x-z 平面上のベクトルを作成
    pub fn planar(x: f64, z: f64) -> Self {
        Self { x, y: 0.0, z }
    }

    /// 高さ成分を落とした水平ベクトル
    pub fn flat(&self) -> Self {
        Self::planar(self.x, self.z)
    }

    pub fn sqr_magnitude(&self) -> f64 {
        self.x * self.x + self.y * self.y + self.z * self.z
    }

    /// ベクトルの長さ
    pub fn magnitude(&self) -> f64 {
        self.sqr_magnitude().sqrt()
    }

    /// 正規化（長さがほぼ0ならゼロベクトルを返す）
    pub fn normalized(&self) -> Self {
        let mag = self.magnitude();
        if mag > EPSILON {
            Self::new(self.x / mag, self.y / mag, self.z / mag)
        } else {
            Self::ZERO
        }
    }

    pub fn is_near_zero(&self) -> bool {
        self.magnitude() <= EPSILON
    }

    pub fn dot(&self, other: &Vector3) -> f64 {
        self.x * other.x + self.y * other.y + self.z * other.z
    }

    /// 3次元距離
    pub fn distance(&self, other: &Vector3) -> f64 {
        (*self - *other).magnitude()
    }

    /// 水平面での距離
    pub fn distance_xz(&self, other: &Vector3) -> f64 {
        (*self - *other).flat().magnitude()
    }
}

impl Add for Vector3 {
    type Output = Self;

    fn add(self, other: Self) -> Self::Output {
        Self::new(self.x + other.x, self.y + other.y, self.z + other.z)
    }
}

impl AddAssign for Vector3 {
    fn add_assign(&mut self, other: Self) {
        *self = *self + other;
    }
}

impl Sub for Vector3 {
    type Output = Self;

    fn sub(self, other: Self) -> Self::Output {
        Self::new(self.x - other.x, self.y - other.y, self.z - other.z)
    }
}

impl Mul<f64> for Vector3 {
    type Output = Self;

    fn mul(self, scalar: f64) -> Self::Output {
        Self::new(self.x * scalar, self.y * scalar, self.z * scalar)
    }
}

/// 数学ユーティリティ関数
pub mod math_utils {
    use super::{Vector3, EPSILON};
    use std::f64::consts::PI;

    /// 値を [0, 1] に制限
    pub fn clamp01(value: f64) -> f64 {
        value.clamp(0.0, 1.0)
    }

    /// 線形補間
    pub fn lerp(a: f64, b: f64, t: f64) -> f64 {
        a + (b - a) * t
    }

    /// 逆線形補間（a→b の区間で value がどの位置にあるか）
    ///
    /// 区間幅が0の場合は段差関数として扱い、`value >= b` なら1、それ以外は0を返します。
    pub fn inverse_lerp(a: f64, b: f64, value: f64) -> f64 {
        if (b - a).abs() < EPSILON {
            return if value >= b { 1.0 } else { 0.0 };
        }
        (value - a) / (b - a)
    }

    /// 角度を (-π, π] の範囲に正規化
    pub fn wrap_pi(angle_rad: f64) -> f64 {
        let mut wrapped = angle_rad % (2.0 * PI);
        if wrapped > PI {
            wrapped -= 2.0 * PI;
        } else if wrapped <= -PI {
            wrapped += 2.0 * PI;
        }
        wrapped
    }

    /// 水平ベクトルの方位角（+z 方向を0、+x 方向を +π/2 とする）
    pub fn heading(v: &Vector3) -> f64 {
        v.x.atan2(v.z)
    }

    /// 水平面での球面線形補間
    ///
    /// 方位角は最短回りで補間し、長さは線形補間します。
    /// どちらかがゼロベクトルの場合はもう一方の水平成分を返します。
    pub fn slerp_planar(from: Vector3, to: Vector3, t: f64) -> Vector3 {
        let t = clamp01(t);
        let from = from.flat();
        let to = to.flat();
        if to.is_near_zero() {
            return from;
        }
        if from.is_near_zero() {
            return to;
        }

        let start = heading(&from);
        let delta = wrap_pi(heading(&to) - start);
        let angle = start + delta * t;
        let length = lerp(from.magnitude(), to.magnitude(), t);

        Vector3::planar(angle.sin() * length, angle.cos() * length)
    }
}
