use std::fmt::Debug;

/// Generic trait representing a matrix.
/// Implementations decide their own storage; the solvers only need the shape.
pub trait Matrix: Debug {
    /// The underlying numeric type of the matrix elements.
    type Value: Copy + Debug + Default;

    /// Returns the dimensions of the matrix as (rows, columns).
    fn dims(&self) -> (usize, usize);

    /// Returns the number of rows.
    fn rows(&self) -> usize {
        self.dims().0
    }

    /// Returns the number of columns.
    fn cols(&self) -> usize {
        self.dims().1
    }

    /// Checks if the matrix is square.
    fn is_square(&self) -> bool {
        let (rows, cols) = self.dims();
        rows == cols
    }

    /// Checks if the matrix has the `[A | b]` shape of a square system.
    fn is_augmented_system(&self) -> bool {
        let (rows, cols) = self.dims();
        rows >= 1 && cols == rows + 1
    }
}

/// Generic trait representing a vector.
pub trait Vector: Debug {
    /// The underlying numeric type of the vector elements.
    type Value: Copy + Debug + Default;

    /// Returns the number of elements in the vector.
    fn len(&self) -> usize;

    /// Checks if the vector is empty.
    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
