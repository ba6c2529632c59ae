use crate::traits::ConvertMatOps;
use candle_util::candle_core::{DType, Device, Tensor};
use nalgebra::DMatrix;

impl ConvertMatOps for DMatrix<f64> {
    type Mat = Self;
    type Scalar = f64;

    /// Copy a 2d tensor (rows x cols) into a column-major matrix
    fn from_tensor(tensor: &Tensor) -> anyhow::Result<Self::Mat> {
        let (nrow, ncol) = tensor.dims2()?;
        let data: Vec<f64> = tensor
            .to_device(&Device::Cpu)?
            .to_dtype(DType::F64)?
            .flatten_all()?
            .to_vec1()?;
        Ok(DMatrix::from_row_slice(nrow, ncol, &data))
    }
}
