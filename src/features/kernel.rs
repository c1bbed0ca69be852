use ndarray::Array2;

pub type Kernel = [[i32; 3]; 3];

pub const LAPLACIAN: Kernel = [[-1, -1, -1], [-1, 8, -1], [-1, -1, -1]];
pub const SOBEL_X: Kernel = [[-1, 0, 1], [-2, 0, 2], [-1, 0, 1]];
pub const SOBEL_Y: Kernel = [[-1, -2, -1], [0, 0, 0], [1, 2, 1]];

/// 3x3 卷积，边界使用最近像素填充，输出与输入尺寸相同
pub fn convolve(gray: &Array2<u8>, kernel: &Kernel) -> Array2<i32> {
    let (h, w) = gray.dim();
    Array2::from_shape_fn((h, w), |(y, x)| {
        let mut acc = 0;
        for (ky, row) in kernel.iter().enumerate() {
            let sy = (y + ky).saturating_sub(1).min(h - 1);
            for (kx, &k) in row.iter().enumerate() {
                let sx = (x + kx).saturating_sub(1).min(w - 1);
                acc += k * gray[[sy, sx]] as i32;
            }
        }
        acc
    })
}

/// 将卷积结果截断到 8 位灰度范围
pub fn clamp_u8(response: &Array2<i32>) -> Array2<u8> {
    response.mapv(|v| v.clamp(0, 255) as u8)
}

#[cfg(test)]
mod tests {
    use ndarray::array;

    use super::*;

    #[test]
    fn test_convolve_flat() {
        let gray = Array2::from_elem((4, 5), 77u8);
        assert!(convolve(&gray, &LAPLACIAN).iter().all(|&v| v == 0));
        assert!(convolve(&gray, &SOBEL_X).iter().all(|&v| v == 0));
    }

    #[test]
    fn test_convolve_vertical_edge() {
        let gray = array![[0u8, 0, 255, 255], [0, 0, 255, 255], [0, 0, 255, 255]];
        let gx = convolve(&gray, &SOBEL_X);
        let gy = convolve(&gray, &SOBEL_Y);
        assert_eq!(gx[[1, 1]], 4 * 255);
        assert_eq!(gx[[1, 2]], 4 * 255);
        assert_eq!(gx[[1, 0]], 0);
        assert!(gy.iter().all(|&v| v == 0));
    }

    #[test]
    fn test_convolve_single_pixel() {
        let gray = array![[10u8]];
        assert_eq!(convolve(&gray, &LAPLACIAN), array![[0]]);
    }

    #[test]
    fn test_clamp_u8() {
        let response = array![[-20, 0], [128, 4000]];
        assert_eq!(clamp_u8(&response), array![[0u8, 0], [128, 255]]);
    }
}
